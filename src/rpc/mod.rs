//! Request/response operations exposed to clients

pub mod activity;

pub use activity::{
    ActivityRecorder, CallerIdentity, RecordActivityRequest, RecordActivityResponse, RpcError,
};
