//! Wire encodings shared by the client and the storage side.
pub mod inspect;
pub mod request;
pub mod table;

pub use request::{ScanRequest, decode_scan_request, encode_scan_request};
pub use table::{decode_schema, decode_table, encode_schema, encode_table};
