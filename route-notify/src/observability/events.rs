//! Canonical structured event names used across `route-notify`.

// Route mutation events.
pub const ROUTE_ADD_OK: &str = "route_add_ok";
pub const ROUTE_UPDATE_OK: &str = "route_update_ok";
pub const ROUTE_MODIFY_OK: &str = "route_modify_ok";
pub const ROUTE_DELETE_START: &str = "route_delete_start";
pub const ROUTE_DELETE_OK: &str = "route_delete_ok";
pub const ROUTE_OPERATION_FAILED: &str = "route_operation_failed";

// Subscription events.
pub const SUBSCRIBE_ATTACHED: &str = "subscribe_attached";
pub const SUBSCRIBE_PLACEHOLDER: &str = "subscribe_placeholder";
pub const SUBSCRIBE_DUPLICATE_IGNORED: &str = "subscribe_duplicate_ignored";
pub const UNSUBSCRIBE_OK: &str = "unsubscribe_ok";

// Dispatch and locking events.
pub const TABLE_INIT: &str = "table_init";
pub const NOTIFY_DISPATCH: &str = "notify_dispatch";
pub const DELIVERY_WAIT: &str = "delivery_wait";
pub const TABLE_TEARDOWN: &str = "table_teardown";
