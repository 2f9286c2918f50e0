use slab::Slab;

use crate::channel::Error;

/// Hands out channel ids from 1 up to the negotiated channel-max
///
/// Ids are only reused after they are released, which happens once the
/// channel's close handshake is over.
#[derive(Debug)]
pub(crate) struct ChannelAllocator<T> {
    slab: Slab<T>,
    channel_max: u16,
}

impl<T> ChannelAllocator<T> {
    /// A `channel_max` of 0 means no limit other than the id space
    pub fn new(channel_max: u16) -> Self {
        Self {
            slab: Slab::new(),
            channel_max: effective_max(channel_max),
        }
    }

    /// Allocates a free id and stores `f(id)` under it
    pub fn allocate(&mut self, f: impl FnOnce(u16) -> T) -> Result<u16, Error> {
        let entry = self.slab.vacant_entry();
        let id = match u16::try_from(entry.key() + 1) {
            Ok(id) if id <= self.channel_max => id,
            _ => return Err(Error::NoChannelsAvailable),
        };
        entry.insert(f(id));
        Ok(id)
    }

    pub fn get_mut(&mut self, id: u16) -> Option<&mut T> {
        match id {
            0 => None,
            id => self.slab.get_mut(id as usize - 1),
        }
    }

    pub fn release(&mut self, id: u16) -> Option<T> {
        match id {
            0 => None,
            id => self.slab.try_remove(id as usize - 1),
        }
    }

    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.slab.drain()
    }
}

fn effective_max(channel_max: u16) -> u16 {
    match channel_max {
        0 => u16::MAX,
        max => max,
    }
}

#[cfg(test)]
mod tests {
    use super::ChannelAllocator;
    use crate::channel::Error;

    #[test]
    fn ids_start_at_one() {
        let mut allocator = ChannelAllocator::new(0);
        assert_eq!(allocator.allocate(|id| id).unwrap(), 1);
        assert_eq!(allocator.allocate(|id| id).unwrap(), 2);
        assert_eq!(allocator.get_mut(2), Some(&mut 2));
        assert_eq!(allocator.get_mut(0), None);
    }

    #[test]
    fn channel_max_bounds_allocation() {
        let mut allocator = ChannelAllocator::new(2);
        allocator.allocate(|_| ()).unwrap();
        allocator.allocate(|_| ()).unwrap();
        assert!(matches!(
            allocator.allocate(|_| ()),
            Err(Error::NoChannelsAvailable)
        ));
    }

    #[test]
    fn ids_are_reused_only_after_release() {
        let mut allocator = ChannelAllocator::new(0);
        for _ in 0..3 {
            allocator.allocate(|_| ()).unwrap();
        }
        assert_eq!(allocator.release(2), Some(()));
        assert_eq!(allocator.release(2), None);

        assert_eq!(allocator.allocate(|_| ()).unwrap(), 2);
        assert_eq!(allocator.allocate(|_| ()).unwrap(), 4);
    }

    #[test]
    fn full_id_space_is_reported() {
        let mut allocator = ChannelAllocator::new(1);
        allocator.allocate(|_| ()).unwrap();
        assert!(allocator.allocate(|_| ()).is_err());
        allocator.drain().for_each(drop);
        assert_eq!(allocator.allocate(|_| ()).unwrap(), 1);
    }
}
