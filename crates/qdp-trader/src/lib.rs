//! Trading-channel session engine for QDP gateways.
//!
//! A [`TraderSession`] owns one gateway connection and turns the vendor's
//! callback stream into canonical orders, trades, positions and accounts
//! for a [`TraderSink`].
//!
//! # Key Components
//!
//! - [`TraderSession`]: login, order submission, cancel, queries
//! - [`SessionStateMachine`]: `NotLoggedIn → Authenticating → LoggedIn → Ready`
//! - [`RequestDispatcher`]: FIFO, one-in-flight, rate-limited query actor
//! - [`InstrumentResolver`]: instrument code to numeric id, per login
//! - [`translator`]: gateway records to canonical records
//! - [`mapping`]: vendor code tables

pub mod config;
pub mod contracts;
pub mod dispatcher;
pub mod error;
pub mod instruments;
pub mod mapping;
pub mod sequence;
pub mod session;
pub mod sink;
pub mod state;
pub mod translator;

pub use config::{CacheConfig, DispatcherConfig, TraderConfig};
pub use contracts::{ContractLookup, ContractTable};
pub use dispatcher::{DispatcherHandle, QueryAction, QueryKind, RequestDispatcher};
pub use error::{TraderError, TraderResult};
pub use instruments::InstrumentResolver;
pub use sequence::Sequence;
pub use session::TraderSession;
pub use sink::{CollectingSink, SinkRecord, TraderEvent, TraderSink};
pub use state::{SessionState, SessionStateMachine};
pub use translator::TranslateContext;
