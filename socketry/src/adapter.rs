//! Adapters own the room membership state of one namespace and the broadcast
//! primitive fanning packets out to a target set. The default
//! [`MemoryAdapter`] keeps everything in process memory; the [`Adapter`]
//! trait is the seam for a cross process implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, Weak};

use tracing::debug;

use crate::{
    errors::BroadcastError,
    ns::Namespace,
    packet::Packet,
    socket::Socket,
};
use socketry_engine::Sid;

/// A room identifier.
pub type Room = String;

/// Target selection for a broadcast: the union of the given rooms (the whole
/// namespace when empty) minus the excluded socket ids.
#[derive(Debug, Clone, Default)]
pub struct BroadcastOptions {
    pub rooms: Vec<Room>,
    pub except: Vec<Sid>,
}

/// Room membership index and broadcast primitive for one namespace.
pub trait Adapter: Sized + Send + Sync + 'static {
    /// Creates the adapter for a namespace. The reference is weak: adapters
    /// never keep sockets alive, removal is always explicit.
    fn new(ns: Weak<Namespace<Self>>) -> Self;

    /// Adds a socket to a room.
    fn add(&self, sid: Sid, room: Room);

    /// Removes a socket from a room.
    fn remove(&self, sid: Sid, room: &str);

    /// Removes a socket from every room it is in.
    fn remove_all(&self, sid: Sid);

    /// The socket ids in a room.
    fn sockets(&self, room: &str) -> Vec<Sid>;

    /// The rooms a socket is in.
    fn socket_rooms(&self, sid: Sid) -> Vec<Room>;

    /// Encodes the packet once and enqueues it on every selected socket.
    fn broadcast(&self, packet: Packet, opts: BroadcastOptions) -> Result<(), BroadcastError>;

    /// Resolves a selection to live sockets.
    fn fetch_sockets(&self, opts: &BroadcastOptions) -> Vec<Arc<Socket<Self>>>;

    /// Releases whatever the adapter holds.
    fn close(&self);
}

#[derive(Debug, Default)]
struct Index {
    rooms: HashMap<Room, HashSet<Sid>>,
    socket_rooms: HashMap<Sid, HashSet<Room>>,
}

/// The default adapter, an in-memory bidirectional index.
///
/// `sid` is in `rooms[room]` exactly when `room` is in `socket_rooms[sid]`,
/// and neither map keeps an empty set alive.
pub struct MemoryAdapter {
    index: RwLock<Index>,
    ns: Weak<Namespace<Self>>,
}

impl Adapter for MemoryAdapter {
    fn new(ns: Weak<Namespace<Self>>) -> Self {
        Self {
            index: RwLock::new(Index::default()),
            ns,
        }
    }

    fn add(&self, sid: Sid, room: Room) {
        let mut index = self.index.write().unwrap();
        index.rooms.entry(room.clone()).or_default().insert(sid);
        index.socket_rooms.entry(sid).or_default().insert(room);
    }

    fn remove(&self, sid: Sid, room: &str) {
        let mut index = self.index.write().unwrap();
        if let Some(members) = index.rooms.get_mut(room) {
            members.remove(&sid);
            if members.is_empty() {
                index.rooms.remove(room);
            }
        }
        if let Some(rooms) = index.socket_rooms.get_mut(&sid) {
            rooms.remove(room);
            if rooms.is_empty() {
                index.socket_rooms.remove(&sid);
            }
        }
    }

    fn remove_all(&self, sid: Sid) {
        let mut index = self.index.write().unwrap();
        if let Some(rooms) = index.socket_rooms.remove(&sid) {
            for room in rooms {
                if let Some(members) = index.rooms.get_mut(&room) {
                    members.remove(&sid);
                    if members.is_empty() {
                        index.rooms.remove(&room);
                    }
                }
            }
        }
    }

    fn sockets(&self, room: &str) -> Vec<Sid> {
        self.index
            .read()
            .unwrap()
            .rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    fn socket_rooms(&self, sid: Sid) -> Vec<Room> {
        self.index
            .read()
            .unwrap()
            .socket_rooms
            .get(&sid)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn broadcast(&self, packet: Packet, opts: BroadcastOptions) -> Result<(), BroadcastError> {
        let data: String = packet.try_into()?;
        let targets = self.fetch_sockets(&opts);
        debug!("broadcasting packet to {} sockets", targets.len());
        for socket in targets {
            // a refused enqueue is that session's problem; its own close
            // path cleans up
            if let Err(e) = socket.send_raw(data.clone()) {
                debug!("[sid={}] dropping broadcast packet: {}", socket.id, e);
            }
        }
        Ok(())
    }

    fn fetch_sockets(&self, opts: &BroadcastOptions) -> Vec<Arc<Socket<Self>>> {
        let Some(ns) = self.ns.upgrade() else {
            return Vec::new();
        };
        let except: HashSet<Sid> = opts.except.iter().copied().collect();
        if opts.rooms.is_empty() {
            ns.sockets()
                .into_iter()
                .filter(|socket| !except.contains(&socket.id))
                .collect()
        } else {
            let index = self.index.read().unwrap();
            let mut seen = HashSet::new();
            opts.rooms
                .iter()
                .filter_map(|room| index.rooms.get(room))
                .flatten()
                .filter(|sid| !except.contains(*sid) && seen.insert(**sid))
                .filter_map(|sid| ns.get_socket(*sid))
                .collect()
        }
    }

    fn close(&self) {
        let mut index = self.index.write().unwrap();
        index.rooms.clear();
        index.socket_rooms.clear();
    }
}

impl std::fmt::Debug for MemoryAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let index = self.index.read().unwrap();
        f.debug_struct("MemoryAdapter")
            .field("rooms", &index.rooms.len())
            .field("sockets", &index.socket_rooms.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use socketry_engine::packet::Packet as EioPacket;

    fn assert_bijective(adapter: &MemoryAdapter) {
        let index = adapter.index.read().unwrap();
        for (room, members) in &index.rooms {
            assert!(!members.is_empty(), "room {room} kept an empty set");
            for sid in members {
                assert!(
                    index.socket_rooms.get(sid).is_some_and(|r| r.contains(room)),
                    "{sid} in rooms[{room}] but not the reverse"
                );
            }
        }
        for (sid, rooms) in &index.socket_rooms {
            assert!(!rooms.is_empty(), "socket {sid} kept an empty set");
            for room in rooms {
                assert!(
                    index.rooms.get(room).is_some_and(|m| m.contains(sid)),
                    "{room} in socket_rooms[{sid}] but not the reverse"
                );
            }
        }
    }

    #[tokio::test]
    async fn add_remove_keeps_the_index_bijective() {
        let ns = Namespace::new_dummy();
        let adapter = &ns.adapter;
        let (a, b) = (Sid::new(), Sid::new());

        adapter.add(a, "room1".into());
        adapter.add(a, "room2".into());
        adapter.add(b, "room1".into());
        assert_bijective(adapter);

        adapter.remove(a, "room1");
        assert_bijective(adapter);
        assert_eq!(adapter.sockets("room1"), vec![b]);
        assert_eq!(adapter.socket_rooms(a), vec!["room2".to_string()]);

        adapter.remove(b, "room1");
        assert_bijective(adapter);
        assert!(adapter.sockets("room1").is_empty());
        assert!(adapter.index.read().unwrap().rooms.get("room1").is_none());
    }

    #[tokio::test]
    async fn remove_all_clears_both_directions() {
        let ns = Namespace::new_dummy();
        let adapter = &ns.adapter;
        let (a, b) = (Sid::new(), Sid::new());

        adapter.add(a, "room1".into());
        adapter.add(a, "room2".into());
        adapter.add(b, "room2".into());

        adapter.remove_all(a);
        assert_bijective(adapter);
        assert!(adapter.socket_rooms(a).is_empty());
        assert!(adapter.sockets("room1").is_empty());
        assert_eq!(adapter.sockets("room2"), vec![b]);
    }

    #[tokio::test]
    async fn broadcast_targets_the_room_union_minus_exclusions() {
        let ns = Namespace::new_dummy();
        let (s1, mut rx1) = ns.add_dummy_socket();
        let (s2, mut rx2) = ns.add_dummy_socket();
        let (s3, mut rx3) = ns.add_dummy_socket();
        // s1 is in both rooms: the union must deliver exactly once
        s1.join(["room1", "room2"]);
        s2.join("room1");
        s3.join("room2");

        let opts = BroadcastOptions {
            rooms: vec!["room1".into(), "room2".into()],
            except: vec![s2.id],
        };
        ns.adapter
            .broadcast(Packet::event("/", "chat", json!(["hello"])), opts)
            .unwrap();

        for rx in [&mut rx1, &mut rx3] {
            let packet = rx.try_recv().unwrap();
            assert_eq!(
                packet,
                EioPacket::Message("2[\"chat\",\"hello\"]".to_string())
            );
            assert!(rx.try_recv().is_err(), "delivered more than once");
        }
        assert!(rx2.try_recv().is_err(), "excluded socket got the packet");
    }

    #[tokio::test]
    async fn broadcast_with_no_rooms_hits_the_whole_namespace() {
        let ns = Namespace::new_dummy();
        let (_s1, mut rx1) = ns.add_dummy_socket();
        let (_s2, mut rx2) = ns.add_dummy_socket();

        ns.adapter
            .broadcast(
                Packet::event("/", "tick", json!([])),
                BroadcastOptions::default(),
            )
            .unwrap();

        for rx in [&mut rx1, &mut rx2] {
            assert_eq!(
                rx.try_recv().unwrap(),
                EioPacket::Message("2[\"tick\"]".to_string())
            );
        }
    }
}
