#![forbid(unsafe_code)]

//! Debuggee-side runtime for the call-interception protocol: proxies that
//! wrap callables, transports that speak to the breakpoint server, and the
//! process-global debug-mode switch.

mod async_dispatch;
mod async_proxy;
mod async_transport;
mod cache;
mod config;
mod dispatch;
mod error;
mod fatal;
mod port_discovery;
mod proxy;
mod proxy_support;
mod state;
mod transport;

pub use async_dispatch::{AsyncCallable, AsyncDispatchTable, BoxedProxyFuture};
pub use async_proxy::AsyncDebugProxy;
pub use async_transport::AsyncTransport;
pub use cache::ValueCache;
pub use config::ClientConfig;
pub use dispatch::{Callable, DispatchTable};
pub use error::ClientError;
pub use fatal::exit_with_server_failure;
pub use port_discovery::{discovery_file_path, read_port};
pub use proxy::{DebugProxy, ProxyError, ProxyResult};
pub use state::{build_config, configure, is_enabled, resolve_server_url, set_mode, Mode};
pub use transport::Transport;
