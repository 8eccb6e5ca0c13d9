//! A self-contained Router + StoragePeer cluster wired entirely over
//! `MemoryChannel`. The CLI has nowhere else to connect to, since this
//! crate carries no real inter-process transport (see DESIGN.md), so it
//! brings its own cluster along and drives it to completion on every
//! request.

use shardmap_core::channel::MemoryChannel;
use shardmap_core::client_stub::{ClientError, Reply};
use shardmap_core::{ClientStub, Router, StoragePeer};

pub struct EmbeddedCluster {
    router: Router<MemoryChannel>,
    peers: Vec<StoragePeer<MemoryChannel, MemoryChannel>>,
    client: ClientStub<MemoryChannel>,
}

impl EmbeddedCluster {
    pub fn new(peer_count: usize) -> Self {
        let mut router: Router<MemoryChannel> = Router::new();
        let mut peers = Vec::with_capacity(peer_count);
        for id in 0..peer_count {
            let (router_end, peer_inbound) = MemoryChannel::pair();
            let (peer_outbound, router_reshard_end) = MemoryChannel::pair();
            router.add_storage(router_end, router_reshard_end);
            peers.push(StoragePeer::new(id, peer_inbound, peer_outbound));
        }
        let (router_client_end, client_channel) = MemoryChannel::pair();
        router.add_client(router_client_end);
        let client = ClientStub::new(client_channel);
        Self { router, peers, client }
    }

    fn tick(&mut self) {
        self.router.tick();
        for peer in self.peers.iter_mut() {
            peer.tick();
        }
    }

    /// Send a request via the closure, tick until the router replies, and
    /// return the decoded reply. `send` must not be called more than once
    /// before the previous request resolves; callers own that invariant.
    pub fn run<F>(&mut self, send: F) -> Result<Reply, ClientError>
    where
        F: FnOnce(&mut ClientStub<MemoryChannel>) -> Result<(), ClientError>,
    {
        send(&mut self.client)?;
        loop {
            self.tick();
            match self.client.poll()? {
                Some(reply) => return Ok(reply),
                None => continue,
            }
        }
    }
}
