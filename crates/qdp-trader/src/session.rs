//! Trading session: the state machine, id generation, tag caches and query
//! dispatch wired to one gateway instance.
//!
//! # Event flow
//!
//! ```text
//! gateway ──GatewayEvent──► event pump ──► handle_event ──► TraderSink
//!    ▲                                          │
//!    └──── send ◄── submit/cancel/login         └─► dispatcher.complete
//!    └──── send ◄── RequestDispatcher ◄── query_*
//! ```
//!
//! Orders and cancels go straight to the gateway. Queries are serialized
//! through the [`RequestDispatcher`]. No session lock is held while a sink
//! method runs.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use qdp_cache::TagCache;
use qdp_core::{
    investor_id_to_num, CanonicalAccount, CanonicalOrder, CanonicalPosition, CanonicalTrade,
    Entrust, EntrustAction, EntrustId,
};
use qdp_gateway::codes::{AF_DELETE, CHF_SPECULATION};
use qdp_gateway::{
    event_channel, AuthenticateField, EventReceiver, FlowSeries, FlowStatusField, GatewayEvent,
    GatewayFactory, GatewayRequest, InputOrderField, OrderActionField, QryField,
    QryInstrumentField, ReqUserLoginField, ReqUserLogoutField, RspInfo, RspUserLoginField,
    TraderGateway,
};
use qdp_telemetry::Metrics;
use rust_decimal::prelude::ToPrimitive;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::TraderConfig;
use crate::contracts::ContractLookup;
use crate::dispatcher::{DispatcherHandle, QueryKind, RequestDispatcher};
use crate::error::{TraderError, TraderResult};
use crate::instruments::InstrumentResolver;
use crate::mapping::{
    from_vendor_trade_status, to_vendor_direction, to_vendor_offset, to_vendor_order_flag,
    to_vendor_price_type,
};
use crate::sequence::Sequence;
use crate::sink::{TraderEvent, TraderSink};
use crate::state::{SessionState, SessionStateMachine};
use crate::translator::{
    log_cache_warning, make_account, make_entrust, make_error, make_order, make_position,
    make_trade, TranslateContext,
};

#[derive(Debug, Clone)]
struct Credentials {
    user: String,
    pass: String,
    product_info: String,
}

/// Rows of the in-flight query, flushed on the terminal record.
#[derive(Default)]
struct QueryBuffers {
    /// Request the buffered rows belong to.
    request_id: Option<u32>,
    accounts: Vec<CanonicalAccount>,
    /// Keyed by `{code}-{direction}`; a later row replaces an earlier one.
    positions: BTreeMap<String, CanonicalPosition>,
    orders: Vec<CanonicalOrder>,
    trades: Vec<CanonicalTrade>,
}

impl QueryBuffers {
    fn clear(&mut self) {
        *self = Self::default();
    }

    /// Drop rows left over from an earlier request.
    fn begin(&mut self, request_id: u32) {
        if self.request_id != Some(request_id) {
            self.clear();
            self.request_id = Some(request_id);
        }
    }
}

/// One trading channel to one broker account.
///
/// Shared as `Arc<TraderSession>`; [`TraderSession::connect`] spawns tasks
/// that hold a weak reference back to it.
pub struct TraderSession {
    config: TraderConfig,
    factory: Arc<dyn GatewayFactory>,
    sink: Arc<dyn TraderSink>,
    contracts: Arc<dyn ContractLookup>,

    gateway: RwLock<Option<Arc<dyn TraderGateway>>>,
    state: SessionStateMachine,
    credentials: Mutex<Option<Credentials>>,

    session_id: AtomicU64,
    trading_date: AtomicU32,
    order_ref: Sequence,
    request_id: Arc<Sequence>,

    instruments: InstrumentResolver,
    /// EntrustId -> user tag.
    eid_cache: TagCache,
    /// Order-system-id -> user tag.
    oid_cache: TagCache,
    buffers: Mutex<QueryBuffers>,

    dispatcher: Mutex<Option<RequestDispatcher>>,
    pump: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl TraderSession {
    pub fn new(
        config: TraderConfig,
        factory: Arc<dyn GatewayFactory>,
        sink: Arc<dyn TraderSink>,
        contracts: Arc<dyn ContractLookup>,
    ) -> Arc<Self> {
        let retention = config.cache.retention;
        Arc::new(Self {
            config,
            factory,
            sink,
            contracts,
            gateway: RwLock::new(None),
            state: SessionStateMachine::new(),
            credentials: Mutex::new(None),
            session_id: AtomicU64::new(0),
            trading_date: AtomicU32::new(0),
            order_ref: Sequence::new(0),
            request_id: Arc::new(Sequence::new(0)),
            instruments: InstrumentResolver::new(),
            eid_cache: TagCache::new("eid", retention),
            oid_cache: TagCache::new("oid", retention),
            buffers: Mutex::new(QueryBuffers::default()),
            dispatcher: Mutex::new(None),
            pump: Mutex::new(None),
        })
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Create the gateway, start the dispatcher and event pump, then start
    /// the gateway against the configured front.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(self: &Arc<Self>) -> TraderResult<()> {
        if self.gateway.read().is_some() {
            warn!("Already connected");
            return Ok(());
        }

        let flow_path = self.config.flow_path();
        std::fs::create_dir_all(&flow_path).map_err(|e| {
            TraderError::Gateway(format!("cannot create flow dir {}: {e}", flow_path.display()))
        })?;

        let (tx, rx) = event_channel();
        let gateway = self.factory.create(&flow_path, tx)?;

        *self.dispatcher.lock() = Some(RequestDispatcher::spawn(
            &self.config.dispatcher,
            Arc::clone(&self.request_id),
        ));

        let cancel = CancellationToken::new();
        let join = tokio::spawn(Self::run_event_pump(Arc::downgrade(self), rx, cancel.clone()));
        *self.pump.lock() = Some((cancel, join));

        *self.gateway.write() = Some(Arc::clone(&gateway));

        info!(
            gateway = self.factory.name(),
            front = %self.config.front,
            broker = %self.config.broker,
            user = %self.config.user,
            resume = ?self.config.resume_mode(),
            "Connecting"
        );
        gateway.start(&self.config.front, self.config.resume_mode())?;
        Ok(())
    }

    async fn run_event_pump(session: Weak<Self>, mut rx: EventReceiver, cancel: CancellationToken) {
        loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => break,

                event = rx.recv() => {
                    let Some(event) = event else {
                        debug!("Gateway event channel closed");
                        break;
                    };
                    let Some(session) = session.upgrade() else {
                        break;
                    };
                    session.handle_event(event);
                }
            }
        }
        debug!("Event pump stopped");
    }

    /// Stop the dispatcher and the event pump, release the gateway.
    ///
    /// Queued queries are discarded. Each task wait is bounded by the
    /// dispatcher shutdown timeout.
    pub async fn disconnect(&self) {
        let dispatcher = self.dispatcher.lock().take();
        if let Some(dispatcher) = dispatcher {
            dispatcher.stop().await;
        }

        let pump = self.pump.lock().take();
        if let Some((cancel, mut join)) = pump {
            cancel.cancel();
            let timeout = self.config.dispatcher.shutdown_timeout();
            if tokio::time::timeout(timeout, &mut join).await.is_err() {
                warn!("Event pump did not stop in time, aborting");
                join.abort();
            }
        }

        let gateway = self.gateway.write().take();
        if let Some(gateway) = gateway {
            gateway.release();
        }

        self.state.reset();
        self.buffers.lock().clear();
        info!("Disconnected");
    }

    // ------------------------------------------------------------------------
    // Login
    // ------------------------------------------------------------------------

    /// Start a login. Authenticates first when an app id and auth code are
    /// configured.
    pub fn login(&self, user: &str, pass: &str, product_info: &str) -> TraderResult<()> {
        let gateway = self.gateway().ok_or(TraderError::Transport)?;
        self.state.begin_login()?;

        let credentials = Credentials {
            user: user.to_string(),
            pass: pass.to_string(),
            product_info: product_info.to_string(),
        };
        *self.credentials.lock() = Some(credentials.clone());

        let request = if self.config.requires_authentication() {
            GatewayRequest::Authenticate(AuthenticateField {
                broker_id: self.config.broker.clone(),
                user_id: credentials.user.clone(),
                app_id: self.config.app_id.clone(),
                auth_code: self.config.auth_code.clone(),
                user_product_info: credentials.product_info.clone(),
            })
        } else {
            self.login_request(&credentials)
        };
        self.send_login(gateway.as_ref(), request)
    }

    fn login_request(&self, credentials: &Credentials) -> GatewayRequest {
        GatewayRequest::UserLogin(ReqUserLoginField {
            broker_id: self.config.broker.clone(),
            user_id: credentials.user.clone(),
            password: credentials.pass.clone(),
            user_product_info: credentials.product_info.clone(),
        })
    }

    fn send_login(&self, gateway: &dyn TraderGateway, request: GatewayRequest) -> TraderResult<()> {
        let kind = request.kind();
        let code = gateway.send(request, self.request_id.next());
        if code != 0 {
            error!(request = kind, code, "Login request send failed");
            self.state.login_failed();
            Metrics::login_result(false);
            return Err(TraderError::Submission { request: kind, code });
        }
        info!(request = kind, broker = %self.config.broker, "Login requested");
        Ok(())
    }

    /// Send a logout. The session returns to `NotLoggedIn` on the response.
    ///
    /// Clears remembered credentials, so a later reconnect only logs in
    /// again when `auto_login` is set.
    pub fn logout(&self) -> TraderResult<()> {
        let gateway = self.gateway().ok_or(TraderError::Transport)?;
        let user = self.account_user();
        self.credentials.lock().take();

        let request = GatewayRequest::UserLogout(ReqUserLogoutField {
            broker_id: self.config.broker.clone(),
            user_id: user,
        });
        let code = gateway.send(request, self.request_id.next());
        if code != 0 {
            return Err(TraderError::Submission {
                request: "user_logout",
                code,
            });
        }
        info!("Logout requested");
        Ok(())
    }

    /// Reissue a login after the front reconnects, if credentials are known.
    fn relogin(&self) {
        let remembered = self.credentials.lock().clone();
        let credentials = remembered.or_else(|| {
            self.config.auto_login.then(|| Credentials {
                user: self.config.user.clone(),
                pass: self.config.pass.clone(),
                product_info: self.config.product_info.clone(),
            })
        });

        let Some(c) = credentials else {
            debug!("No credentials known, waiting for login");
            return;
        };
        if let Err(e) = self.login(&c.user, &c.pass, &c.product_info) {
            warn!(error = %e, "Automatic login failed");
        }
    }

    // ------------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------------

    /// Next entrust id for this session. Consumes one order ref.
    pub fn make_entrust_id(&self) -> TraderResult<EntrustId> {
        Ok(EntrustId::encode(self.session_id(), self.order_ref.next())?)
    }

    /// Submit an order. Returns the entrust id it was sent under.
    ///
    /// The acknowledgement arrives later through
    /// [`TraderSink::on_rsp_entrust`].
    pub fn submit_order(&self, entrust: &Entrust) -> TraderResult<EntrustId> {
        let gateway = self.ready_gateway()?;

        let Some(instrument_num) = self.instruments.resolve(&entrust.code) else {
            warn!(code = %entrust.code, "Instrument not resolved, order rejected");
            Metrics::order_rejected("resolution");
            return Err(TraderError::Resolution(entrust.code.clone()));
        };
        let (Ok(volume), Some(limit_price)) = (i32::try_from(entrust.volume), entrust.price.to_f64()) else {
            warn!(code = %entrust.code, volume = entrust.volume, price = %entrust.price, "Order out of range, rejected");
            Metrics::order_rejected("invalid");
            return Err(TraderError::InvalidOrder(format!(
                "volume {} at price {} not representable",
                entrust.volume, entrust.price
            )));
        };

        let entrust_id = match &entrust.entrust_id {
            Some(id) => {
                if id.session_id() != self.session_id() {
                    warn!(entrust_id = %id, session_id = self.session_id(), "Entrust id from another session");
                }
                id.clone()
            }
            None => self.make_entrust_id()?,
        };

        // Cached before the send, since the order push may be handled before
        // `send` returns. Undone if the send fails.
        let replaced_tag = entrust.tag().map(|tag| {
            let previous = self.eid_cache.get(entrust_id.as_str());
            self.eid_cache.put(entrust_id.as_str(), tag, 0, log_cache_warning);
            previous
        });

        let user = self.account_user();
        let (time_condition, volume_condition) = to_vendor_order_flag(entrust.order_flag);
        let request = InputOrderField {
            broker_id: self.config.broker.clone(),
            investor_id_num: investor_id_to_num(&user),
            user_id: user.clone(),
            investor_id: user,
            instrument_id: entrust.code.clone(),
            instrument_id_num: instrument_num,
            exchange_id: entrust.exchange.clone(),
            user_order_local_id: entrust_id.order_ref(),
            order_price_type: to_vendor_price_type(entrust.price_type),
            direction: to_vendor_direction(entrust.direction, entrust.offset),
            offset_flag: to_vendor_offset(entrust.offset),
            hedge_flag: CHF_SPECULATION,
            limit_price,
            volume,
            time_condition,
            volume_condition,
        };

        let code = gateway.send(GatewayRequest::OrderInsert(request), self.request_id.next());
        if code != 0 {
            error!(entrust_id = %entrust_id, code, "Order send failed");
            match replaced_tag {
                Some(Some(previous)) => self.eid_cache.put(entrust_id.as_str(), &previous, 0, log_cache_warning),
                Some(None) => self.eid_cache.remove(entrust_id.as_str(), log_cache_warning),
                None => {}
            }
            Metrics::order_send_failed();
            return Err(TraderError::Submission {
                request: "order_insert",
                code,
            });
        }

        Metrics::order_sent();
        debug!(
            entrust_id = %entrust_id,
            code = %entrust.code,
            direction = %entrust.direction,
            price = %entrust.price,
            volume = entrust.volume,
            flag = %entrust.order_flag,
            "Order sent"
        );
        Ok(entrust_id)
    }

    /// Cancel an order by its entrust id and order-system-id.
    pub fn cancel_order(&self, action: &EntrustAction) -> TraderResult<()> {
        let gateway = self.ready_gateway()?;

        let (_, order_ref) = EntrustId::decode(&action.entrust_id).map_err(|e| {
            Metrics::cancel("format");
            TraderError::from(e)
        })?;

        let user = self.account_user();
        let request = OrderActionField {
            broker_id: self.config.broker.clone(),
            user_id: user.clone(),
            investor_id: user,
            exchange_id: action.exchange.clone(),
            order_sys_id: action.order_id.clone(),
            user_order_local_id: order_ref,
            action_flag: AF_DELETE,
        };

        let code = gateway.send(GatewayRequest::OrderAction(request), self.request_id.next());
        if code != 0 {
            error!(entrust_id = %action.entrust_id, code, "Cancel send failed");
            Metrics::cancel("send_failed");
            return Err(TraderError::Submission {
                request: "order_action",
                code,
            });
        }

        Metrics::cancel("sent");
        debug!(entrust_id = %action.entrust_id, order_id = %action.order_id, "Cancel sent");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn query_account(&self) -> TraderResult<()> {
        self.enqueue_query(QueryKind::Account, GatewayRequest::QryInvestorAccount)
    }

    pub fn query_positions(&self) -> TraderResult<()> {
        self.enqueue_query(QueryKind::Positions, GatewayRequest::QryInvestorPosition)
    }

    pub fn query_orders(&self) -> TraderResult<()> {
        self.enqueue_query(QueryKind::Orders, GatewayRequest::QryOrder)
    }

    pub fn query_trades(&self) -> TraderResult<()> {
        self.enqueue_query(QueryKind::Trades, GatewayRequest::QryTrade)
    }

    fn enqueue_query(&self, kind: QueryKind, make: fn(QryField) -> GatewayRequest) -> TraderResult<()> {
        let gateway = self.ready_gateway()?;
        let handle = self.dispatcher_handle().ok_or(TraderError::DispatcherStopped)?;

        let user = self.account_user();
        let request = make(QryField {
            broker_id: self.config.broker.clone(),
            user_id: user.clone(),
            investor_id: user,
        });
        handle.enqueue(kind, Box::new(move |request_id| gateway.send(request, request_id)))
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// True iff the session is ready for trading.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.is_ready()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    /// `YYYYMMDD` from the last successful login, 0 before.
    #[must_use]
    pub fn trading_date(&self) -> u32 {
        self.trading_date.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn session_id(&self) -> u64 {
        self.session_id.load(Ordering::Acquire)
    }

    pub async fn wait_until_ready(&self) {
        self.state.wait_until_ready().await;
    }

    /// Instrument ids loaded since the last login.
    #[must_use]
    pub fn instruments(&self) -> &InstrumentResolver {
        &self.instruments
    }

    #[must_use]
    pub fn config(&self) -> &TraderConfig {
        &self.config
    }

    fn gateway(&self) -> Option<Arc<dyn TraderGateway>> {
        self.gateway.read().clone()
    }

    /// Gateway for order and query operations, checked against the state.
    fn ready_gateway(&self) -> TraderResult<Arc<dyn TraderGateway>> {
        let gateway = self.gateway().ok_or(TraderError::Transport)?;
        let state = self.state.current();
        if state != SessionState::Ready {
            return Err(TraderError::NotReady(state));
        }
        Ok(gateway)
    }

    fn dispatcher_handle(&self) -> Option<DispatcherHandle> {
        self.dispatcher.lock().as_ref().map(RequestDispatcher::handle)
    }

    fn account_user(&self) -> String {
        self.credentials
            .lock()
            .as_ref()
            .map_or_else(|| self.config.user.clone(), |c| c.user.clone())
    }

    fn translate_context(&self) -> TranslateContext<'_> {
        TranslateContext {
            session_id: self.session_id(),
            trading_date: self.trading_date(),
            contracts: self.contracts.as_ref(),
            eid_cache: &self.eid_cache,
            oid_cache: &self.oid_cache,
        }
    }

    // ------------------------------------------------------------------------
    // Gateway events
    // ------------------------------------------------------------------------

    /// Apply one gateway callback.
    pub fn handle_event(&self, event: GatewayEvent) {
        match event {
            GatewayEvent::FrontConnected => {
                info!("Front connected");
                self.sink.handle_event(TraderEvent::Connect);
                self.relogin();
            }
            GatewayEvent::FrontDisconnected { reason } => {
                warn!(reason, "Front disconnected");
                self.state.reset();
                if let Some(handle) = self.dispatcher_handle() {
                    handle.abandon_pending();
                }
                self.buffers.lock().clear();
                self.sink.handle_event(TraderEvent::Close { reason });
            }
            GatewayEvent::HeartBeatWarning { time_lapse } => {
                debug!(time_lapse, "Heartbeat warning");
            }
            GatewayEvent::RspAuthenticate { rsp } => self.on_authenticate(&rsp),
            GatewayEvent::RspUserLogin { record, rsp } => match record {
                Some(record) if !rsp.is_error() => self.on_login_success(&record),
                _ => self.on_login_failure(TraderError::Login(rsp.error_msg.clone()), rsp.error_id),
            },
            GatewayEvent::RspUserLogout { rsp } => {
                if rsp.is_error() {
                    warn!(code = rsp.error_id, message = %rsp.error_msg, "Logout rejected");
                    return;
                }
                info!("Logged out");
                self.state.reset();
                self.sink.handle_event(TraderEvent::Logout);
            }
            GatewayEvent::RspOrderInsert { record, rsp }
            | GatewayEvent::ErrRtnOrderInsert { record, rsp } => {
                self.on_order_insert(record.as_ref(), &rsp);
            }
            GatewayEvent::RspOrderAction { record, rsp }
            | GatewayEvent::ErrRtnOrderAction { record, rsp } => {
                if rsp.is_error() {
                    warn!(
                        code = rsp.error_id,
                        message = %rsp.error_msg,
                        order_id = record.as_ref().map_or("", |r| r.order_sys_id.as_str()),
                        "Cancel rejected"
                    );
                    Metrics::cancel("rejected");
                    Metrics::business_error("order_action");
                    self.sink.on_trader_error(&TraderError::CancelRejected {
                        code: rsp.error_id,
                        message: rsp.error_msg,
                    });
                }
            }
            GatewayEvent::RspQryInvestorAccount { record, rsp, request_id, is_last } => {
                if !self.begin_query_row(QueryKind::Account, request_id) {
                    return;
                }
                if self.query_row_ok(QueryKind::Account, &rsp) {
                    if let Some(field) = record {
                        self.buffers.lock().accounts.push(make_account(&field));
                    }
                }
                if is_last {
                    let rows = std::mem::take(&mut self.buffers.lock().accounts);
                    if !rsp.is_error() {
                        self.sink.on_rsp_account(&rows);
                    }
                    self.query_completed(QueryKind::Account, request_id);
                }
            }
            GatewayEvent::RspQryInvestorPosition { record, rsp, request_id, is_last } => {
                if !self.begin_query_row(QueryKind::Positions, request_id) {
                    return;
                }
                if self.query_row_ok(QueryKind::Positions, &rsp) {
                    if let Some(position) =
                        record.and_then(|f| make_position(&self.translate_context(), &f))
                    {
                        self.buffers.lock().positions.insert(position.key(), position);
                    }
                }
                if is_last {
                    let rows: Vec<CanonicalPosition> =
                        std::mem::take(&mut self.buffers.lock().positions).into_values().collect();
                    if !rsp.is_error() {
                        self.sink.on_rsp_positions(&rows);
                    }
                    self.query_completed(QueryKind::Positions, request_id);
                }
            }
            GatewayEvent::RspQryOrder { record, rsp, request_id, is_last } => {
                if !self.begin_query_row(QueryKind::Orders, request_id) {
                    return;
                }
                if self.query_row_ok(QueryKind::Orders, &rsp) {
                    if let Some(order) = record.and_then(|f| make_order(&self.translate_context(), &f)) {
                        self.buffers.lock().orders.push(order);
                    }
                }
                if is_last {
                    let rows = std::mem::take(&mut self.buffers.lock().orders);
                    if !rsp.is_error() {
                        self.sink.on_rsp_orders(&rows);
                    }
                    self.query_completed(QueryKind::Orders, request_id);
                }
            }
            GatewayEvent::RspQryTrade { record, rsp, request_id, is_last } => {
                if !self.begin_query_row(QueryKind::Trades, request_id) {
                    return;
                }
                if self.query_row_ok(QueryKind::Trades, &rsp) {
                    if let Some(trade) = record.and_then(|f| make_trade(&self.translate_context(), &f)) {
                        self.buffers.lock().trades.push(trade);
                    }
                }
                if is_last {
                    let rows = std::mem::take(&mut self.buffers.lock().trades);
                    if !rsp.is_error() {
                        self.sink.on_rsp_trades(&rows);
                    }
                    self.query_completed(QueryKind::Trades, request_id);
                }
            }
            GatewayEvent::RspQryInstrument { record, rsp, is_last, .. } => {
                if rsp.is_error() {
                    warn!(code = rsp.error_id, message = %rsp.error_msg, "Instrument query error");
                    Metrics::business_error("qry_instrument");
                } else if let Some(field) = record {
                    self.instruments.insert(&field.instrument_id, field.instrument_id_num);
                }
                if is_last {
                    self.instruments.mark_complete();
                }
            }
            GatewayEvent::RtnOrder(field) => {
                if let Some(order) = make_order(&self.translate_context(), &field) {
                    self.sink.on_push_order(&order);
                }
            }
            GatewayEvent::RtnTrade(field) => {
                if let Some(trade) = make_trade(&self.translate_context(), &field) {
                    self.sink.on_push_trade(&trade);
                }
            }
            GatewayEvent::RtnInstrumentStatus(field) => {
                let status = from_vendor_trade_status(field.instrument_status);
                self.sink
                    .on_push_instrument_status(&field.exchange_id, &field.instrument_id, status);
            }
        }
    }

    fn on_authenticate(&self, rsp: &RspInfo) {
        if rsp.is_error() {
            self.on_login_failure(TraderError::Authentication(rsp.error_msg.clone()), rsp.error_id);
            return;
        }

        debug!("Authenticated");
        let credentials = self.credentials.lock().clone();
        let (Some(gateway), Some(credentials)) = (self.gateway(), credentials) else {
            warn!("Authenticated without a gateway or credentials");
            self.state.login_failed();
            return;
        };
        let request = self.login_request(&credentials);
        if let Err(e) = self.send_login(gateway.as_ref(), request) {
            self.sink.on_login_result(false, &e.to_string(), 0);
        }
    }

    fn on_login_success(&self, record: &RspUserLoginField) {
        let Some(trading_date) = parse_trading_day(&record.trading_day) else {
            self.on_login_failure(
                TraderError::Login(format!("invalid trading day {:?}", record.trading_day)),
                0,
            );
            return;
        };

        self.state.logged_in();
        self.session_id.store(record.session_id, Ordering::Release);
        self.order_ref.seed(record.max_order_local_id);
        self.trading_date.store(trading_date, Ordering::Release);

        for (cache, path) in [
            (&self.eid_cache, self.config.eid_cache_path()),
            (&self.oid_cache, self.config.oid_cache_path()),
        ] {
            if let Err(e) = cache.init(&path, trading_date, log_cache_warning) {
                warn!(path = %path.display(), error = %e, "Tag cache unavailable, continuing in memory");
            }
        }

        self.instruments.reset();
        self.state.mark_ready();
        Metrics::login_result(true);
        info!(
            session_id = record.session_id,
            max_order_local_id = record.max_order_local_id,
            trading_date,
            "Logged in"
        );
        self.sink.on_login_result(true, "", trading_date);

        let Some(gateway) = self.gateway() else {
            return;
        };
        for series in [FlowSeries::Private, FlowSeries::Public] {
            gateway.send(GatewayRequest::Ready(FlowStatusField { series, ready: true }), 0);
        }
        let code = gateway.send(
            GatewayRequest::QryInstrument(QryInstrumentField::default()),
            self.request_id.next(),
        );
        if code != 0 {
            warn!(code, "Instrument query send failed, orders cannot resolve");
        }
    }

    fn on_login_failure(&self, error: TraderError, code: i32) {
        warn!(code, error = %error, "Login failed");
        self.state.login_failed();
        Metrics::login_result(false);
        let message = match &error {
            TraderError::Login(m) | TraderError::Authentication(m) => m.clone(),
            other => other.to_string(),
        };
        self.sink.on_login_result(false, &message, 0);
    }

    fn on_order_insert(&self, record: Option<&InputOrderField>, rsp: &RspInfo) {
        let error = rsp.is_error().then(|| {
            Metrics::order_rejected("business");
            Metrics::business_error("order_insert");
            make_error(rsp)
        });
        if let Some(e) = &error {
            warn!(
                error = %e,
                local_id = record.map_or(0, |r| r.user_order_local_id),
                "Order rejected"
            );
        }

        match record.and_then(|r| make_entrust(&self.translate_context(), r)) {
            Some(entrust) => self.sink.on_rsp_entrust(&entrust, error.as_ref()),
            None => {
                if let Some(e) = &error {
                    self.sink.on_trader_error(e);
                }
            }
        }
    }

    /// Accept a response row only for the query the dispatcher is waiting on.
    ///
    /// Rows of a query that timed out or was abandoned are dropped.
    fn begin_query_row(&self, kind: QueryKind, request_id: u32) -> bool {
        let pending = self.dispatcher_handle().and_then(|h| h.pending_request());
        if pending != Some(request_id) {
            debug!(%kind, request_id, ?pending, "Stale query response dropped");
            Metrics::query_stale_response(kind.as_str());
            return false;
        }
        self.buffers.lock().begin(request_id);
        true
    }

    /// Report an error row. Returns true when the row carries data.
    fn query_row_ok(&self, kind: QueryKind, rsp: &RspInfo) -> bool {
        if !rsp.is_error() {
            return true;
        }
        warn!(%kind, code = rsp.error_id, message = %rsp.error_msg, "Query error");
        Metrics::business_error(kind.as_str());
        self.sink.on_trader_error(&make_error(rsp));
        false
    }

    fn query_completed(&self, kind: QueryKind, request_id: u32) {
        if let Some(handle) = self.dispatcher_handle() {
            handle.complete(kind, request_id);
        }
    }
}

/// `YYYYMMDD` as sent by the front; anything else is rejected.
fn parse_trading_day(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let date: u32 = raw.parse().ok()?;
    let (month, day) = (date / 100 % 100, date % 100);
    ((1..=12).contains(&month) && (1..=31).contains(&day)).then_some(date)
}

impl std::fmt::Debug for TraderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraderSession")
            .field("gateway", &self.factory.name())
            .field("broker", &self.config.broker)
            .field("user", &self.config.user)
            .field("state", &self.state.current())
            .field("session_id", &self.session_id())
            .field("trading_date", &self.trading_date())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ContractTable;
    use crate::sink::{CollectingSink, SinkRecord};
    use mockall::mock;
    use qdp_core::{ContractInfo, Direction, OffsetType, OrderFlag};
    use qdp_gateway::codes::*;
    use qdp_gateway::{
        EventSender, GatewayResult, InstrumentField, InvestorPositionField, OrderField,
        RecordingFactory, RecordingGateway, ResumeMode, TradeField,
    };
    use rust_decimal_macros::dec;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    mock! {
        pub Gateway {}

        impl TraderGateway for Gateway {
            fn start(&self, front: &str, resume: ResumeMode) -> GatewayResult<()>;
            fn send(&self, request: GatewayRequest, request_id: u32) -> i32;
            fn release(&self);
        }
    }

    struct FixedFactory(Arc<dyn TraderGateway>);

    impl GatewayFactory for FixedFactory {
        fn name(&self) -> &str {
            "fixed"
        }

        fn create(&self, _flow_path: &Path, _events: EventSender) -> GatewayResult<Arc<dyn TraderGateway>> {
            Ok(Arc::clone(&self.0))
        }
    }

    fn config(dir: &TempDir) -> TraderConfig {
        let mut config = TraderConfig::new("tcp://127.0.0.1:30005", "9999", "AB1234567");
        config.flow_dir = dir.path().to_path_buf();
        config.auto_login = false;
        config
    }

    fn contracts() -> Arc<ContractTable> {
        Arc::new(ContractTable::from_contracts([
            ContractInfo::new("IF2401", "CFFEX", 300),
            ContractInfo::new("cu2402", "SHFE", 5),
        ]))
    }

    struct Harness {
        _dir: TempDir,
        session: Arc<TraderSession>,
        gateway: Arc<RecordingGateway>,
        sink: Arc<CollectingSink>,
    }

    impl Harness {
        fn connected(configure: impl FnOnce(&mut TraderConfig)) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let mut config = config(&dir);
            configure(&mut config);
            let factory = RecordingFactory::new();
            let gateway = factory.gateway();
            let sink = Arc::new(CollectingSink::new());
            let session = TraderSession::new(config, Arc::new(factory), sink.clone(), contracts());
            session.connect().unwrap();
            Self {
                _dir: dir,
                session,
                gateway,
                sink,
            }
        }

        /// Log in as session 5 with max local id 100, then load instruments.
        fn ready() -> Self {
            Self::ready_with(|_| {})
        }

        fn ready_with(configure: impl FnOnce(&mut TraderConfig)) -> Self {
            let h = Self::connected(configure);
            h.session.login("AB1234567", "secret", "test").unwrap();
            h.session.handle_event(GatewayEvent::RspUserLogin {
                record: Some(RspUserLoginField {
                    broker_id: "9999".to_string(),
                    user_id: "AB1234567".to_string(),
                    session_id: 5,
                    max_order_local_id: 100,
                    trading_day: "20240102".to_string(),
                }),
                rsp: RspInfo::ok(),
            });
            h.session.handle_event(GatewayEvent::RspQryInstrument {
                record: Some(InstrumentField {
                    instrument_id: "IF2401".to_string(),
                    exchange_id: "CFFEX".to_string(),
                    instrument_id_num: 7,
                    volume_multiple: 300,
                }),
                rsp: RspInfo::ok(),
                request_id: 2,
                is_last: true,
            });
            h.gateway.clear_sends();
            h.sink.clear();
            h
        }

        /// Request ids of the queries sent so far.
        fn query_request_ids(&self) -> Vec<u32> {
            self.gateway
                .get_sends()
                .into_iter()
                .filter(|(r, _)| r.is_query())
                .map(|(_, id)| id)
                .collect()
        }

        fn order_inserts(&self) -> Vec<InputOrderField> {
            self.gateway
                .requests()
                .into_iter()
                .filter_map(|r| match r {
                    GatewayRequest::OrderInsert(f) => Some(f),
                    _ => None,
                })
                .collect()
        }
    }

    fn buy_if(volume: u32) -> Entrust {
        Entrust::new("IF2401", "CFFEX", dec!(3500), volume, Direction::Long)
    }

    #[tokio::test]
    async fn test_operations_need_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let session = TraderSession::new(
            config(&dir),
            Arc::new(RecordingFactory::new()),
            Arc::new(CollectingSink::new()),
            contracts(),
        );

        assert_eq!(session.login("u", "p", "x"), Err(TraderError::Transport));
        assert_eq!(session.logout(), Err(TraderError::Transport));
        assert_eq!(session.submit_order(&buy_if(1)), Err(TraderError::Transport));
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn test_not_ready_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut gateway = MockGateway::new();
        gateway.expect_start().returning(|_, _| Ok(()));
        gateway.expect_send().never();
        gateway.expect_release().return_const(());

        let session = TraderSession::new(
            config(&dir),
            Arc::new(FixedFactory(Arc::new(gateway))),
            Arc::new(CollectingSink::new()),
            contracts(),
        );
        session.connect().unwrap();

        let not_ready = Err(TraderError::NotReady(SessionState::NotLoggedIn));
        assert_eq!(session.submit_order(&buy_if(1)).map(|_| ()), not_ready);
        assert_eq!(
            session.cancel_order(&EntrustAction {
                code: "IF2401".to_string(),
                exchange: "CFFEX".to_string(),
                entrust_id: "0000000005#000101".to_string(),
                order_id: "SYS42".to_string(),
            }),
            not_ready
        );
        assert_eq!(session.query_account(), not_ready);
        assert_eq!(session.query_positions(), not_ready);
        assert_eq!(session.query_orders(), not_ready);
        assert_eq!(session.query_trades(), not_ready);

        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_login_sequence() {
        let h = Harness::connected(|_| {});
        assert_eq!(h.gateway.front().as_deref(), Some("tcp://127.0.0.1:30005"));

        h.session.login("AB1234567", "secret", "test").unwrap();
        assert_eq!(h.session.state(), SessionState::Authenticating);
        assert_eq!(
            h.session.login("AB1234567", "secret", "test"),
            Err(TraderError::LoginInProgress)
        );
        match h.gateway.requests().as_slice() {
            [GatewayRequest::UserLogin(req)] => {
                assert_eq!(req.password, "secret");
                assert_eq!(req.broker_id, "9999");
            }
            other => panic!("unexpected requests: {other:?}"),
        }

        h.session.handle_event(GatewayEvent::RspUserLogin {
            record: Some(RspUserLoginField {
                session_id: 5,
                max_order_local_id: 100,
                trading_day: "20240102".to_string(),
                ..Default::default()
            }),
            rsp: RspInfo::ok(),
        });

        assert!(h.session.is_connected());
        assert_eq!(h.session.session_id(), 5);
        assert_eq!(h.session.trading_date(), 20240102);
        assert_eq!(
            h.sink.records(),
            vec![SinkRecord::Login {
                success: true,
                message: String::new(),
                trading_date: 20240102,
            }]
        );

        let kinds: Vec<&str> = h.gateway.requests().iter().map(GatewayRequest::kind).collect();
        assert_eq!(kinds, vec!["user_login", "ready", "ready", "qry_instrument"]);
        assert_eq!(h.session.make_entrust_id().unwrap().as_str(), "0000000005#000101");

        h.session.disconnect().await;
        assert!(h.gateway.is_released());
        assert_eq!(h.session.state(), SessionState::NotLoggedIn);
    }

    #[tokio::test]
    async fn test_authentication_precedes_login() {
        let h = Harness::connected(|c| {
            c.app_id = "app".to_string();
            c.auth_code = "code".to_string();
        });

        h.session.login("AB1234567", "secret", "test").unwrap();
        assert!(matches!(h.gateway.requests().as_slice(), [GatewayRequest::Authenticate(a)] if a.app_id == "app"));

        h.session.handle_event(GatewayEvent::RspAuthenticate { rsp: RspInfo::ok() });
        let kinds: Vec<&str> = h.gateway.requests().iter().map(GatewayRequest::kind).collect();
        assert_eq!(kinds, vec!["authenticate", "user_login"]);

        h.session.disconnect().await;
    }

    #[tokio::test]
    async fn test_login_failures() {
        let h = Harness::connected(|_| {});

        h.gateway.set_next_result(-1);
        assert_eq!(
            h.session.login("AB1234567", "secret", "test"),
            Err(TraderError::Submission {
                request: "user_login",
                code: -1
            })
        );
        assert_eq!(h.session.state(), SessionState::LoginFailed);

        h.gateway.set_next_result(0);
        h.session.login("AB1234567", "wrong", "test").unwrap();
        h.session.handle_event(GatewayEvent::RspUserLogin {
            record: None,
            rsp: RspInfo::error(3, "bad password"),
        });
        assert_eq!(h.session.state(), SessionState::LoginFailed);
        assert_eq!(
            h.sink.records(),
            vec![SinkRecord::Login {
                success: false,
                message: "bad password".to_string(),
                trading_date: 0,
            }]
        );

        h.session.disconnect().await;
    }

    #[tokio::test]
    async fn test_unparseable_trading_day_fails_login() {
        let h = Harness::connected(|_| {});

        h.session.login("AB1234567", "secret", "test").unwrap();
        h.session.handle_event(GatewayEvent::RspUserLogin {
            record: Some(RspUserLoginField {
                session_id: 5,
                max_order_local_id: 100,
                trading_day: "2024-01-02".to_string(),
                ..Default::default()
            }),
            rsp: RspInfo::ok(),
        });

        assert_eq!(h.session.state(), SessionState::LoginFailed);
        assert!(!h.session.is_connected());
        assert_eq!(h.session.trading_date(), 0);
        match h.sink.records().as_slice() {
            [SinkRecord::Login { success: false, message, trading_date: 0 }] => {
                assert!(message.contains("2024-01-02"), "{message}");
            }
            other => panic!("unexpected sink records: {other:?}"),
        }
        // No stream setup or instrument query after a failed login.
        let kinds: Vec<&str> = h.gateway.requests().iter().map(GatewayRequest::kind).collect();
        assert_eq!(kinds, vec!["user_login"]);

        h.session.disconnect().await;
    }

    #[test]
    fn test_parse_trading_day() {
        assert_eq!(parse_trading_day(" 20240102 "), Some(20240102));
        assert_eq!(parse_trading_day(""), None);
        assert_eq!(parse_trading_day("2024012"), None);
        assert_eq!(parse_trading_day("20241302"), None);
        assert_eq!(parse_trading_day("+2024010"), None);
    }

    #[tokio::test]
    async fn test_tag_bridges_from_order_to_trade() {
        let h = Harness::ready();

        let entrust = buy_if(2).with_user_tag("T1");
        let entrust_id = h.session.submit_order(&entrust).unwrap();
        assert_eq!(entrust_id.as_str(), "0000000005#000101");

        let inserts = h.order_inserts();
        assert_eq!(inserts.len(), 1);
        let req = &inserts[0];
        assert_eq!(req.user_order_local_id, 101);
        assert_eq!(req.instrument_id_num, 7);
        assert_eq!(req.investor_id_num, 1234567);
        assert_eq!(req.direction, D_BUY);
        assert_eq!(req.offset_flag, OF_OPEN);
        assert_eq!(req.hedge_flag, CHF_SPECULATION);
        assert_eq!((req.time_condition, req.volume_condition), (TC_GFD, VC_AV));
        assert_eq!(req.volume, 2);

        h.session.handle_event(GatewayEvent::RtnOrder(OrderField {
            instrument_id: "IF2401".to_string(),
            exchange_id: "CFFEX".to_string(),
            order_sys_id: "SYS42".to_string(),
            user_order_local_id: 101,
            direction: D_BUY,
            offset_flag: OF_OPEN,
            order_price_type: OPT_LIMIT_PRICE,
            limit_price: 3500.0,
            volume: 2,
            volume_remain: 2,
            time_condition: TC_GFD,
            volume_condition: VC_AV,
            insert_time: "09:30:00".to_string(),
            order_status: OS_NO_TRADE_QUEUEING,
            ..Default::default()
        }));
        h.session.handle_event(GatewayEvent::RtnTrade(TradeField {
            trade_id: "T-1".to_string(),
            order_sys_id: "SYS42".to_string(),
            user_order_local_id: 101,
            instrument_id: "IF2401".to_string(),
            exchange_id: "CFFEX".to_string(),
            direction: D_BUY,
            offset_flag: OF_OPEN,
            trade_price: 3500.0,
            trade_volume: 2,
            trade_time: "09:30:01".to_string(),
            ..Default::default()
        }));

        let orders = h.sink.push_orders();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].entrust_id, entrust_id);
        assert_eq!(orders[0].user_tag, "T1");

        let trades = h.sink.push_trades();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].user_tag.as_deref(), Some("T1"));
        assert_eq!(trades[0].amount, dec!(2100000));

        h.session.disconnect().await;
    }

    #[tokio::test]
    async fn test_unresolved_instrument_consumes_nothing() {
        let h = Harness::ready();

        let unknown = Entrust::new("cu2402", "SHFE", dec!(68000), 1, Direction::Short);
        assert_eq!(
            h.session.submit_order(&unknown),
            Err(TraderError::Resolution("cu2402".to_string()))
        );
        assert!(h.gateway.requests().is_empty());

        let id = h.session.submit_order(&buy_if(1)).unwrap();
        assert_eq!(id.order_ref(), 101);

        h.session.disconnect().await;
    }

    #[tokio::test]
    async fn test_submission_failure_and_supplied_id() {
        let h = Harness::ready();

        let supplied = EntrustId::encode(5, 555).unwrap();
        let entrust = buy_if(1)
            .with_offset(OffsetType::CloseToday)
            .with_order_flag(OrderFlag::Fok)
            .with_entrust_id(supplied.clone());
        assert_eq!(h.session.submit_order(&entrust).unwrap(), supplied);

        let req = &h.order_inserts()[0];
        assert_eq!(req.user_order_local_id, 555);
        assert_eq!(req.direction, D_SELL);
        assert_eq!(req.offset_flag, OF_CLOSE_TODAY);
        assert_eq!((req.time_condition, req.volume_condition), (TC_IOC, VC_CV));

        h.gateway.set_next_result(-2);
        assert_eq!(
            h.session.submit_order(&buy_if(1).with_user_tag("lost")),
            Err(TraderError::Submission {
                request: "order_insert",
                code: -2
            })
        );
        // Nothing is cached for an id that was never submitted.
        assert_eq!(h.session.eid_cache.get("0000000005#000101"), None);

        // A failed resend under a supplied id keeps the tag it was sent with.
        h.gateway.set_next_result(0);
        let tagged = buy_if(1).with_entrust_id(supplied.clone());
        h.session.submit_order(&tagged.clone().with_user_tag("A")).unwrap();
        h.gateway.set_next_result(-2);
        assert!(h.session.submit_order(&tagged.with_user_tag("B")).is_err());
        assert_eq!(h.session.eid_cache.get(supplied.as_str()).as_deref(), Some("A"));
        assert_eq!(h.session.eid_cache.len(), 1);

        h.session.disconnect().await;
    }

    #[tokio::test]
    async fn test_out_of_range_volume_rejected_locally() {
        let h = Harness::ready();

        let huge = buy_if(3_000_000_000).with_user_tag("T1");
        assert!(matches!(
            h.session.submit_order(&huge),
            Err(TraderError::InvalidOrder(_))
        ));
        assert!(h.gateway.requests().is_empty());
        assert!(h.session.eid_cache.is_empty());

        // No order ref was consumed.
        assert_eq!(h.session.submit_order(&buy_if(1)).unwrap().order_ref(), 101);
        assert_eq!(h.order_inserts()[0].volume, 1);

        h.session.disconnect().await;
    }

    #[tokio::test]
    async fn test_cancel_decodes_entrust_id() {
        let h = Harness::ready();

        let bad = EntrustAction {
            code: "IF2401".to_string(),
            exchange: "CFFEX".to_string(),
            entrust_id: "garbage".to_string(),
            order_id: "SYS42".to_string(),
        };
        assert!(matches!(h.session.cancel_order(&bad), Err(TraderError::Format(_))));
        assert!(h.gateway.requests().is_empty());

        let good = EntrustAction {
            entrust_id: "0000000005#000101".to_string(),
            ..bad
        };
        h.session.cancel_order(&good).unwrap();
        match h.gateway.requests().as_slice() {
            [GatewayRequest::OrderAction(a)] => {
                assert_eq!(a.user_order_local_id, 101);
                assert_eq!(a.order_sys_id, "SYS42");
                assert_eq!(a.action_flag, AF_DELETE);
                assert_eq!(a.exchange_id, "CFFEX");
            }
            other => panic!("unexpected requests: {other:?}"),
        }

        h.session.handle_event(GatewayEvent::RspOrderAction {
            record: None,
            rsp: RspInfo::error(25, "order not found"),
        });
        assert_eq!(
            h.sink.errors(),
            vec![TraderError::CancelRejected {
                code: 25,
                message: "order not found".to_string()
            }]
        );

        h.session.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_query_flushes_on_last_row() {
        let h = Harness::ready();

        h.session.query_positions().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(matches!(
            h.gateway.requests().as_slice(),
            [GatewayRequest::QryInvestorPosition(_)]
        ));
        let request_id = h.query_request_ids()[0];

        let row = |position: i32| InvestorPositionField {
            instrument_id: "IF2401".to_string(),
            exchange_id: "CFFEX".to_string(),
            direction: D_BUY,
            hedge_flag: CHF_SPECULATION,
            position,
            today_position: 1,
            position_cost: 3_000_000.0,
            ..Default::default()
        };
        h.session.handle_event(GatewayEvent::RspQryInvestorPosition {
            record: Some(row(2)),
            rsp: RspInfo::ok(),
            request_id,
            is_last: false,
        });
        assert!(h.sink.is_empty());

        h.session.handle_event(GatewayEvent::RspQryInvestorPosition {
            record: Some(row(5)),
            rsp: RspInfo::ok(),
            request_id,
            is_last: true,
        });
        match h.sink.records().as_slice() {
            [SinkRecord::Positions(rows)] => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].total_position(), 5);
                assert_eq!(rows[0].avg_price, dec!(2000));
            }
            other => panic!("unexpected sink records: {other:?}"),
        }

        h.session.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_rows_of_timed_out_query_are_dropped() {
        let h = Harness::ready_with(|c| c.dispatcher.query_timeout_ms = 5_000);

        let row = |direction: char, position: i32| InvestorPositionField {
            instrument_id: "IF2401".to_string(),
            exchange_id: "CFFEX".to_string(),
            direction,
            hedge_flag: CHF_SPECULATION,
            position,
            today_position: position,
            position_cost: 1_000_000.0,
            ..Default::default()
        };

        for _ in 0..3 {
            h.session.query_positions().unwrap();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        let timed_out = h.query_request_ids()[0];
        h.session.handle_event(GatewayEvent::RspQryInvestorPosition {
            record: Some(row(D_SELL, 1)),
            rsp: RspInfo::ok(),
            request_id: timed_out,
            is_last: false,
        });

        // The first query times out and the second one is sent.
        tokio::time::sleep(Duration::from_secs(6)).await;
        let ids = h.query_request_ids();
        assert_eq!(ids.len(), 2);
        let current = ids[1];

        // Its terminal record arrives late and is ignored.
        h.session.handle_event(GatewayEvent::RspQryInvestorPosition {
            record: Some(row(D_SELL, 1)),
            rsp: RspInfo::ok(),
            request_id: timed_out,
            is_last: true,
        });
        assert!(h.sink.is_empty());
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(h.query_request_ids().len(), 2);
        assert_eq!(
            h.session.dispatcher_handle().and_then(|d| d.pending_request()),
            Some(current)
        );

        h.session.handle_event(GatewayEvent::RspQryInvestorPosition {
            record: Some(row(D_BUY, 2)),
            rsp: RspInfo::ok(),
            request_id: current,
            is_last: true,
        });
        match h.sink.records().as_slice() {
            [SinkRecord::Positions(rows)] => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].direction, Direction::Long);
                assert_eq!(rows[0].total_position(), 2);
            }
            other => panic!("unexpected sink records: {other:?}"),
        }

        // Completion frees the slot for the third query.
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(h.query_request_ids().len(), 3);

        h.session.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_error_row_reported() {
        let h = Harness::ready();

        h.session.query_trades().unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let request_id = h.query_request_ids()[0];

        h.session.handle_event(GatewayEvent::RspQryTrade {
            record: None,
            rsp: RspInfo::error(90, "query too frequent"),
            request_id,
            is_last: true,
        });
        assert_eq!(
            h.sink.records(),
            vec![SinkRecord::Error(TraderError::Business {
                code: 90,
                message: "query too frequent".to_string()
            })]
        );

        h.session.disconnect().await;
    }

    #[tokio::test]
    async fn test_disconnect_and_reconnect_relogin() {
        let h = Harness::ready();

        h.session.handle_event(GatewayEvent::FrontDisconnected { reason: 0x1001 });
        assert_eq!(h.session.state(), SessionState::NotLoggedIn);
        assert_eq!(
            h.session.query_account(),
            Err(TraderError::NotReady(SessionState::NotLoggedIn))
        );

        h.session.handle_event(GatewayEvent::FrontConnected);
        assert_eq!(h.session.state(), SessionState::Authenticating);
        assert!(matches!(
            h.gateway.requests().as_slice(),
            [GatewayRequest::UserLogin(r)] if r.password == "secret"
        ));
        assert_eq!(
            h.sink.records(),
            vec![
                SinkRecord::Event(TraderEvent::Close { reason: 0x1001 }),
                SinkRecord::Event(TraderEvent::Connect),
            ]
        );

        h.session.disconnect().await;
    }

    #[tokio::test]
    async fn test_logout() {
        let h = Harness::ready();

        h.session.logout().unwrap();
        assert!(matches!(h.gateway.requests().as_slice(), [GatewayRequest::UserLogout(_)]));

        h.session.handle_event(GatewayEvent::RspUserLogout { rsp: RspInfo::ok() });
        assert_eq!(h.session.state(), SessionState::NotLoggedIn);
        assert_eq!(h.sink.records(), vec![SinkRecord::Event(TraderEvent::Logout)]);

        // Credentials are forgotten and auto login is off.
        h.gateway.clear_sends();
        h.session.handle_event(GatewayEvent::FrontConnected);
        assert!(h.gateway.requests().is_empty());

        h.session.disconnect().await;
    }

    #[tokio::test]
    async fn test_instrument_status_push() {
        let h = Harness::ready();

        h.session.handle_event(GatewayEvent::RtnInstrumentStatus(
            qdp_gateway::InstrumentStatusField {
                exchange_id: "CFFEX".to_string(),
                instrument_id: "IF2401".to_string(),
                instrument_status: IS_CONTINOUS,
            },
        ));
        assert_eq!(
            h.sink.records(),
            vec![SinkRecord::InstrumentStatus {
                exchange: "CFFEX".to_string(),
                code: "IF2401".to_string(),
                status: qdp_core::TradeStatus::Continuous,
            }]
        );

        h.session.disconnect().await;
    }
}
