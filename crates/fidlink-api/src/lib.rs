// fidlink-api: wire layer for talking to petal and spectrograph controllers

pub mod command;
pub mod discovery;
pub mod error;
pub mod rpc;
pub mod transport;

pub use command::{
    PowerAction, RemoteCommand, RpcRequest, SealAction, SetChannelsRequest, ShutterAction,
};
pub use discovery::{Advertisement, Announcement, SeekQuery, Seeker};
pub use error::Error;
pub use rpc::RpcClient;
pub use transport::TransportConfig;
