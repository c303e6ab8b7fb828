//! Outstanding item-list requests, keyed by correlation id.
//!
//! The table is shared between the serial worker and the client handle so a
//! client's requests can be cancelled without waiting for the queue. A
//! cancelled request's late response finds no entry and is discarded.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use super::subscription::subscription_command;
use super::Engine;
use crate::callbacks::{ClientId, ItemListCallback};
use crate::error::{ClientError, ClientResult};
use crate::model::{Player, SubscriptionLevel};
use crate::protocol::query::{find_query, parse_item_list, QueryCommand};
use crate::protocol::token::TokenMap;

/// One page of an item-list response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemBatch {
    /// Total items available for the query.
    pub count: i32,
    /// Index of the first item of this page.
    pub start: i32,
    pub parameters: TokenMap,
    pub items: Vec<TokenMap>,
}

impl ItemBatch {
    /// True if this page reaches the end of the list.
    pub fn is_last(&self) -> bool {
        self.items.is_empty() || self.start + self.items.len() as i32 >= self.count
    }
}

#[derive(Clone)]
pub(crate) enum ItemReceiver {
    Client {
        client: ClientId,
        callback: Arc<dyn ItemListCallback>,
    },
    /// The engine's own player listing.
    Players,
}

#[derive(Clone)]
pub(crate) struct PendingRequest {
    /// Command words including any player or plugin prefix.
    pub command: String,
    pub params: Vec<String>,
    pub start: i32,
    /// Keep requesting pages until the list is exhausted.
    pub fetch_all: bool,
    pub receiver: ItemReceiver,
}

impl PendingRequest {
    pub(crate) fn new(
        command: String,
        start: i32,
        params: Vec<String>,
        receiver: ItemReceiver,
    ) -> Self {
        Self {
            command,
            params,
            start: start.max(0),
            fetch_all: start < 0,
            receiver,
        }
    }
}

#[derive(Default)]
struct PendingTable {
    next_id: u64,
    requests: HashMap<u64, PendingRequest>,
}

#[derive(Clone, Default)]
pub struct PendingRequests {
    inner: Arc<Mutex<PendingTable>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, request: PendingRequest) -> u64 {
        let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        table.next_id += 1;
        let id = table.next_id;
        table.requests.insert(id, request);
        id
    }

    pub(crate) fn take(&self, id: u64) -> Option<PendingRequest> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .remove(&id)
    }

    /// Forget every request made on behalf of `client`.
    pub fn cancel_client(&self, client: ClientId) -> usize {
        let mut table = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let before = table.requests.len();
        table.requests.retain(|_, request| {
            !matches!(&request.receiver, ItemReceiver::Client { client: c, .. } if *c == client)
        });
        before - table.requests.len()
    }

    pub fn clear(&self) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .clear();
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Requests and responses
// =============================================================================

impl Engine {
    /// Request a server-wide list on behalf of `client`.
    ///
    /// `start < 0` fetches every page from the beginning, delivering each
    /// page as it arrives.
    pub fn request_items(
        &mut self,
        client: ClientId,
        command: &str,
        start: i32,
        params: Vec<String>,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        self.handshake.require_complete()?;
        find_query(command, false)
            .ok_or_else(|| ClientError::InvalidArgument(format!("not a list command: {}", command)))?;
        let request = PendingRequest::new(
            command.to_string(),
            start,
            params,
            ItemReceiver::Client { client, callback },
        );
        self.send_item_request(request, false);
        Ok(())
    }

    /// Request a list addressed to the active player.
    pub fn request_player_items(
        &mut self,
        client: ClientId,
        command: &str,
        start: i32,
        params: Vec<String>,
        callback: Arc<dyn ItemListCallback>,
    ) -> ClientResult<()> {
        self.handshake.require_complete()?;
        let player = self.active_player_id().ok_or(ClientError::NoActivePlayer)?;
        find_query(command, true).ok_or_else(|| {
            ClientError::InvalidArgument(format!("not a player list command: {}", command))
        })?;
        let request = PendingRequest::new(
            format!("{} {}", player.encoded(), command),
            start,
            params,
            ItemReceiver::Client { client, callback },
        );
        self.send_item_request(request, false);
        Ok(())
    }

    /// Forget the known players and list them again.
    pub(crate) fn fetch_players(&mut self) {
        if let Some(conn) = self.connection.as_mut() {
            for id in conn.player_ids() {
                let Some(player) = conn.player_mut(id.as_str()) else {
                    continue;
                };
                if player.state.set_subscription(SubscriptionLevel::None) {
                    self.channel
                        .send(subscription_command(&id, SubscriptionLevel::None));
                }
            }
            conn.clear_players();
        }

        let request =
            PendingRequest::new("players".to_string(), -1, Vec::new(), ItemReceiver::Players);
        self.send_item_request(request, true);
    }

    /// `immediate` lets the request through before the handshake completes.
    fn send_item_request(&mut self, request: PendingRequest, immediate: bool) {
        let mut line = format!(
            "{} {} {}",
            request.command, request.start, self.options.page_size
        );
        for param in &request.params {
            line.push(' ');
            line.push_str(param);
        }
        let id = self.pending.insert(request);
        let line = format!("{} correlationid:{}", line, id);

        if immediate {
            self.channel.send_immediately(line);
        } else {
            self.channel.send(line);
        }
    }

    /// Deliver one page of a list response to whoever asked for it.
    pub(super) fn handle_item_list(&mut self, query: &'static QueryCommand, tokens: &[&str]) {
        let response = parse_item_list(query, tokens);
        let Some(id) = response.correlation_id else {
            debug!("Dropping {} listing without correlation id", query.cmd);
            return;
        };
        let Some(request) = self.pending.take(id) else {
            debug!("Dropping {} listing for cancelled request {}", query.cmd, id);
            return;
        };

        let batch = ItemBatch {
            count: response.count,
            start: request.start,
            parameters: response.parameters,
            items: response.items,
        };

        if request.fetch_all && !batch.is_last() {
            let next = PendingRequest {
                start: request.start + batch.items.len() as i32,
                ..request.clone()
            };
            let immediate = matches!(next.receiver, ItemReceiver::Players);
            self.send_item_request(next, immediate);
        }

        match request.receiver {
            ItemReceiver::Client { callback, .. } => callback.on_items_received(batch),
            ItemReceiver::Players => self.on_players_batch(&batch),
        }
    }

    fn on_players_batch(&mut self, batch: &ItemBatch) {
        let Some(conn) = self.connection.as_mut() else {
            return;
        };
        conn.add_players(batch.items.iter().filter_map(Player::from_record).collect());
        if batch.is_last() {
            info!(
                "{} player(s) known",
                self.connection.as_ref().map_or(0, |c| c.player_ids().len())
            );
            self.select_initial_player();
        }
    }
}
