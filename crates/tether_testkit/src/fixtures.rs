//! Item, rule, and coordinator fixtures.

use tether_core::crypto::{FieldCipher, FieldKey};
use tether_core::{ConflictRule, LookupKey, SyncItem};
use tether_sync_engine::{MemoryComponent, MockTransport, SyncConfig, SyncCoordinator};

/// A push acknowledgement body accepting the batch.
pub const ACK_OK: &str = "status:2:ok\n";

/// Builds a lookup key, panicking on invalid input.
pub fn key(component: &str, type_id: Option<&str>, item: &str) -> LookupKey {
    LookupKey::new(component, type_id, item).expect("Invalid lookup key")
}

/// A bookmark with a URL.
pub fn bookmark(id: &str, url: &str) -> SyncItem {
    SyncItem::new("bookmarks", None, id)
        .expect("Invalid bookmark id")
        .with_property("url", url)
}

/// A saved login.
pub fn login(id: &str, host: &str, username: &str, password: &str) -> SyncItem {
    SyncItem::new("passwords", Some("login"), id)
        .expect("Invalid login id")
        .with_property("host", host)
        .with_property("username", username)
        .with_property("password", password)
}

/// "No two bookmarks share a URL."
pub fn url_rule() -> ConflictRule {
    ConflictRule::new("url", ["url"])
}

/// "No two logins share a host and username."
pub fn login_rule() -> ConflictRule {
    ConflictRule::new("origin", ["host", "username"]).scoped_to("login")
}

/// A cipher under a key made of one repeated byte.
pub fn cipher(byte: u8) -> FieldCipher {
    FieldCipher::new(FieldKey::from_bytes(&[byte; 32]).expect("Invalid key"))
}

/// A bookmarks coordinator over an accepting mock transport, with the URL
/// rule installed.
pub fn bookmark_coordinator() -> SyncCoordinator<MemoryComponent, MockTransport> {
    let transport = MockTransport::new();
    transport.set_push_response(ACK_OK);
    SyncCoordinator::new(SyncConfig::new("bookmarks"), MemoryComponent::new(), transport)
        .with_rule(url_rule())
}

/// A passwords coordinator sealing `password` with `cipher(key_byte)`.
pub fn password_coordinator(key_byte: u8) -> SyncCoordinator<MemoryComponent, MockTransport> {
    let transport = MockTransport::new();
    transport.set_push_response(ACK_OK);
    SyncCoordinator::new(
        SyncConfig::new("passwords"),
        MemoryComponent::new().with_sensitive_fields(["password"]),
        transport,
    )
    .with_cipher(cipher(key_byte))
    .with_rule(login_rule())
}
