//! Broadcast target selection: a [`BroadcastOperator`] accumulates
//! `{rooms, except}` with chained calls before a single `emit`.

use std::sync::Arc;

use serde::Serialize;

use crate::{
    adapter::{Adapter, BroadcastOptions, MemoryAdapter, Room},
    errors::BroadcastError,
    ns::Namespace,
    packet::Packet,
};
use socketry_engine::Sid;

/// A trait for types usable as a room parameter.
///
/// [`String`], [`&'static str`](str), [`Vec<String>`], [`Vec<&'static str>`],
/// const arrays and [`Sid`] are implemented by default.
pub trait RoomParam: 'static {
    type IntoIter: Iterator<Item = Room>;

    fn into_room_iter(self) -> Self::IntoIter;
}

impl RoomParam for Room {
    type IntoIter = std::iter::Once<Room>;
    #[inline(always)]
    fn into_room_iter(self) -> Self::IntoIter {
        std::iter::once(self)
    }
}
impl RoomParam for &'static str {
    type IntoIter = std::iter::Once<Room>;
    #[inline(always)]
    fn into_room_iter(self) -> Self::IntoIter {
        std::iter::once(self.to_string())
    }
}
impl RoomParam for Vec<String> {
    type IntoIter = std::vec::IntoIter<Room>;
    #[inline(always)]
    fn into_room_iter(self) -> Self::IntoIter {
        self.into_iter()
    }
}
impl RoomParam for Vec<&'static str> {
    type IntoIter = std::iter::Map<std::vec::IntoIter<&'static str>, fn(&'static str) -> Room>;
    #[inline(always)]
    fn into_room_iter(self) -> Self::IntoIter {
        self.into_iter().map(str::to_string)
    }
}
impl<const COUNT: usize> RoomParam for [&'static str; COUNT] {
    type IntoIter =
        std::iter::Map<std::array::IntoIter<&'static str, COUNT>, fn(&'static str) -> Room>;
    #[inline(always)]
    fn into_room_iter(self) -> Self::IntoIter {
        self.into_iter().map(str::to_string)
    }
}
impl<const COUNT: usize> RoomParam for [String; COUNT] {
    type IntoIter = std::array::IntoIter<String, COUNT>;
    #[inline(always)]
    fn into_room_iter(self) -> Self::IntoIter {
        self.into_iter()
    }
}
impl RoomParam for Sid {
    type IntoIter = std::iter::Once<Room>;
    #[inline(always)]
    fn into_room_iter(self) -> Self::IntoIter {
        std::iter::once(self.to_string())
    }
}

/// Accumulates a broadcast target set over one namespace.
///
/// The selection is the union of the accumulated rooms (the whole namespace
/// when no room was given) minus the excluded socket ids.
pub struct BroadcastOperator<A: Adapter = MemoryAdapter> {
    ns: Arc<Namespace<A>>,
    opts: BroadcastOptions,
}

impl<A: Adapter> BroadcastOperator<A> {
    pub(crate) fn new(ns: Arc<Namespace<A>>) -> Self {
        Self {
            ns,
            opts: BroadcastOptions::default(),
        }
    }

    /// Adds rooms to the target selection. Repeated calls append.
    pub fn to(mut self, rooms: impl RoomParam) -> Self {
        self.opts.rooms.extend(rooms.into_room_iter());
        self
    }

    /// Excludes socket ids from the selection. Repeated calls append.
    pub fn except(mut self, sids: impl IntoIterator<Item = Sid>) -> Self {
        self.opts.except.extend(sids);
        self
    }

    /// Emits the event to every selected socket.
    ///
    /// The packet is encoded once for the whole fan-out. A socket whose
    /// queue refuses the packet is skipped; its own close path deals with
    /// the failure.
    pub fn emit(
        self,
        event: impl Into<std::borrow::Cow<'static, str>>,
        data: impl Serialize,
    ) -> Result<(), BroadcastError> {
        let data = serde_json::to_value(data)?;
        let packet = Packet::event(self.ns.path.clone(), event.into(), data);
        self.ns.adapter.broadcast(packet, self.opts)
    }

    /// Resolves the current selection to socket ids.
    pub fn sockets(&self) -> Vec<Sid> {
        self.ns
            .adapter
            .fetch_sockets(&self.opts)
            .into_iter()
            .map(|socket| socket.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ns::Namespace;

    #[tokio::test]
    async fn operator_accumulates_rooms_and_exclusions() {
        let ns = Namespace::new_dummy();
        let (s1, _rx1) = ns.add_dummy_socket();
        let (s2, _rx2) = ns.add_dummy_socket();
        s1.join("room1");
        s2.join(["room2", "room3"]);

        let op = BroadcastOperator::new(ns.clone())
            .to("room1")
            .to(["room2", "room3"])
            .except([s2.id]);
        assert_eq!(
            op.opts.rooms,
            vec!["room1".to_string(), "room2".to_string(), "room3".to_string()]
        );
        assert_eq!(op.opts.except, vec![s2.id]);
        assert_eq!(op.sockets(), vec![s1.id]);
    }

    #[tokio::test]
    async fn empty_selection_targets_the_namespace() {
        let ns = Namespace::new_dummy();
        let (s1, _rx1) = ns.add_dummy_socket();
        let (s2, _rx2) = ns.add_dummy_socket();

        let mut sids = BroadcastOperator::new(ns.clone()).sockets();
        sids.sort();
        let mut expected = vec![s1.id, s2.id];
        expected.sort();
        assert_eq!(sids, expected);
    }
}
