// crates/gapool-rpc/src/handlers/mod.rs
//
// Handler modules for client methods. Each handler turns a decoded request
// into the response for that request.

pub mod job;
