//! Generic PUS service
//!
//! A service owns a table of subservice handlers and a FIFO of accepted
//! telecommands. [`PusService::process`] drains the FIFO, runs the handler
//! for each packet and reports the outcome to request verification.
//!
//! `process` takes `&mut self` and is driven from a single control loop.
//! Packets may be queued concurrently through [`PusService::enqueue`] or a
//! [`TcInbox`] handle.

use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use puscommon::{AckFlag, Outcome, ServiceType, TcPacket};

use crate::verification::RequestVerification;

const SEQ_COUNT_MODULO: u16 = 1 << 14;

/// Identity of the application process a service belongs to
#[derive(Debug)]
pub struct PusIdent {
    apid: u16,
    seq_count: AtomicU16,
}

impl PusIdent {
    pub fn new(apid: u16) -> Self {
        Self {
            apid,
            seq_count: AtomicU16::new(0),
        }
    }

    pub fn apid(&self) -> u16 {
        self.apid
    }

    /// Return the current packet sequence count and advance it
    pub fn seq_count(&self) -> u16 {
        self.seq_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| Some((c + 1) % SEQ_COUNT_MODULO))
            .unwrap_or_else(|c| c)
    }
}

/// Handler of one subservice, called with the telecommand application data
pub type SubserviceHandler<S> = fn(&mut S, &[u8]) -> Outcome;

/// Service specific state
pub trait ServiceState {
    /// Periodic work, called after each processing cycle
    fn update(&mut self) {}
}

/// Services as seen by the host loop
pub trait Service: Send {
    fn name(&self) -> &'static str;
    fn enqueue(&self, packet: TcPacket) -> bool;
    fn process(&mut self) -> usize;
    fn update(&mut self);
}

type TcQueue = Arc<Mutex<VecDeque<TcPacket>>>;

fn accepts(apid: u16, service: u8, packet: &TcPacket, has_subservice: bool) -> bool {
    packet.apid == apid && packet.service == service && has_subservice
}

/// Generic service: identity, subservice table and inbound queue
pub struct PusService<S> {
    service_type: ServiceType,
    ident: Arc<PusIdent>,
    verification: Arc<dyn RequestVerification>,
    subservices: BTreeMap<u8, SubserviceHandler<S>>,
    inbound: TcQueue,
    state: S,
}

impl<S: ServiceState> PusService<S> {
    pub fn new(
        service_type: ServiceType,
        ident: Arc<PusIdent>,
        verification: Arc<dyn RequestVerification>,
        state: S,
    ) -> Self {
        Self {
            service_type,
            ident,
            verification,
            subservices: BTreeMap::new(),
            inbound: Arc::new(Mutex::new(VecDeque::new())),
            state,
        }
    }

    /// Register a subservice handler; a later registration replaces an earlier one
    pub fn register(&mut self, subservice: u8, handler: SubserviceHandler<S>) {
        if self.subservices.insert(subservice, handler).is_some() {
            warn!("{}: subservice {} handler replaced", self.name(), subservice);
        }
    }

    pub fn has_subservice(&self, subservice: u8) -> bool {
        self.subservices.contains_key(&subservice)
    }

    /// Queue a telecommand addressed to this service. Packets for another
    /// APID, another service or an unknown subservice are dropped.
    pub fn enqueue(&self, packet: TcPacket) -> bool {
        let has_subservice = self.has_subservice(packet.subservice);
        if !accepts(self.ident.apid(), self.service(), &packet, has_subservice) {
            debug!(
                "{}: dropping TC apid {} ({},{})",
                self.name(),
                packet.apid,
                packet.service,
                packet.subservice
            );
            return false;
        }
        self.inbound.lock().unwrap_or_else(PoisonError::into_inner).push_back(packet);
        true
    }

    /// Handle for queueing packets from another context. The accepted
    /// subservices are fixed when the handle is created.
    pub fn inbox(&self) -> TcInbox {
        TcInbox {
            apid: self.ident.apid(),
            service: self.service(),
            subservices: Arc::new(self.subservices.keys().copied().collect()),
            queue: self.inbound.clone(),
        }
    }

    /// Number of packets waiting to be processed
    pub fn queued(&self) -> usize {
        self.inbound.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Execute all queued telecommands in arrival order and report their
    /// outcome. Returns the number of packets processed.
    pub fn process(&mut self) -> usize {
        let mut processed = 0;
        while let Some(packet) = self.pop() {
            let Some(handler) = self.subservices.get(&packet.subservice).copied() else {
                warn!("{}: no handler for subservice {}", self.name(), packet.subservice);
                continue;
            };

            let outcome = handler(&mut self.state, &packet.app_data);
            let success = outcome.is_success();
            let code = outcome.code();
            debug!(
                "{}: TC({},{}) seq {} -> {:?}",
                self.name(),
                packet.service,
                packet.subservice,
                packet.seq_count,
                outcome
            );

            if packet.requests_ack(AckFlag::Acceptance) {
                self.verification.accept(&packet, code, success);
            }
            if packet.requests_ack(AckFlag::Completion) {
                self.verification.complete(&packet, code, success);
            }
            processed += 1;
        }
        processed
    }

    pub fn update(&mut self) {
        self.state.update();
    }

    fn pop(&self) -> Option<TcPacket> {
        self.inbound.lock().unwrap_or_else(PoisonError::into_inner).pop_front()
    }

    /// Service type number
    pub fn service(&self) -> u8 {
        self.service_type.to_u8()
    }

    pub fn name(&self) -> &'static str {
        self.service_type.name()
    }

    pub fn description(&self) -> &'static str {
        self.service_type.description()
    }

    pub fn ident(&self) -> &Arc<PusIdent> {
        &self.ident
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut S {
        &mut self.state
    }
}

impl<S: ServiceState + Send> Service for PusService<S> {
    fn name(&self) -> &'static str {
        PusService::name(self)
    }

    fn enqueue(&self, packet: TcPacket) -> bool {
        PusService::enqueue(self, packet)
    }

    fn process(&mut self) -> usize {
        PusService::process(self)
    }

    fn update(&mut self) {
        PusService::update(self)
    }
}

/// Cloneable producer side of a service's inbound queue
#[derive(Debug, Clone)]
pub struct TcInbox {
    apid: u16,
    service: u8,
    subservices: Arc<BTreeSet<u8>>,
    queue: TcQueue,
}

impl TcInbox {
    /// Queue a packet with the same filtering as [`PusService::enqueue`]
    pub fn push(&self, packet: TcPacket) -> bool {
        let has_subservice = self.subservices.contains(&packet.subservice);
        if !accepts(self.apid, self.service, &packet, has_subservice) {
            return false;
        }
        self.queue.lock().unwrap_or_else(PoisonError::into_inner).push_back(packet);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verification::{VerificationRecorder, VerificationStage};
    use puscommon::{AckFlags, ErrorCode};
    use std::thread;

    const APID: u16 = 10;

    #[derive(Default)]
    struct Journal {
        seen: Vec<Vec<u8>>,
        updates: u32,
    }

    impl ServiceState for Journal {
        fn update(&mut self) {
            self.updates += 1;
        }
    }

    fn record(state: &mut Journal, app_data: &[u8]) -> Outcome {
        state.seen.push(app_data.to_vec());
        Outcome::Success
    }

    fn reject(_state: &mut Journal, app_data: &[u8]) -> Outcome {
        (!app_data.is_empty() && app_data[0] == 1).into()
    }

    fn custom_code(_state: &mut Journal, _app_data: &[u8]) -> Outcome {
        Outcome::Failure(ErrorCode(0x100))
    }

    fn service() -> (PusService<Journal>, Arc<VerificationRecorder>) {
        let verification = Arc::new(VerificationRecorder::new());
        let mut service = PusService::new(
            ServiceType::Test,
            Arc::new(PusIdent::new(APID)),
            verification.clone(),
            Journal::default(),
        );
        service.register(1, record);
        service.register(2, reject);
        service.register(3, custom_code);
        (service, verification)
    }

    fn tc(subservice: u8, app_data: Vec<u8>) -> TcPacket {
        TcPacket::new(APID, 17, subservice, app_data)
            .with_ack(AckFlags::NONE.with(AckFlag::Acceptance).with(AckFlag::Completion))
    }

    #[test]
    fn test_seq_count_wraps() {
        let ident = PusIdent::new(1);
        assert_eq!(ident.seq_count(), 0);
        assert_eq!(ident.seq_count(), 1);
        ident.seq_count.store(SEQ_COUNT_MODULO - 1, Ordering::SeqCst);
        assert_eq!(ident.seq_count(), SEQ_COUNT_MODULO - 1);
        assert_eq!(ident.seq_count(), 0);
    }

    #[test]
    fn test_service_identity() {
        let (service, _) = service();
        assert_eq!(service.service(), 17);
        assert_eq!(service.name(), "TEST");
        assert_eq!(service.description(), "Test");
        assert_eq!(service.ident().apid(), APID);
    }

    #[test]
    fn test_enqueue_filters() {
        let (service, _) = service();
        assert!(service.enqueue(tc(1, vec![])));
        assert!(!service.enqueue(TcPacket::new(APID + 1, 17, 1, vec![])));
        assert!(!service.enqueue(TcPacket::new(APID, 5, 1, vec![])));
        assert!(!service.enqueue(tc(9, vec![])));
        assert_eq!(service.queued(), 1);
    }

    #[test]
    fn test_process_fifo_order() {
        let (mut service, _) = service();
        for i in 0..3u8 {
            service.enqueue(tc(1, vec![i]));
        }
        assert_eq!(service.process(), 3);
        assert_eq!(service.state().seen, vec![vec![0], vec![1], vec![2]]);
        assert_eq!(service.queued(), 0);
        assert_eq!(service.process(), 0);
    }

    #[test]
    fn test_failure_is_isolated() {
        let (mut service, verification) = service();
        service.enqueue(tc(2, vec![0]));
        service.enqueue(tc(3, vec![]));
        service.enqueue(tc(1, vec![7]));
        assert_eq!(service.process(), 3);
        assert_eq!(service.state().seen, vec![vec![7]]);

        let reports = verification.reports();
        assert_eq!(reports.len(), 6);
        assert!(!reports[0].success);
        assert_eq!(reports[0].code, Some(ErrorCode(5)));
        assert_eq!(reports[2].code, Some(ErrorCode(0x100)));
        assert!(!reports[3].success);
        assert!(reports[4].success);
        assert_eq!(reports[5].code, None);
    }

    #[test]
    fn test_ack_only_when_requested() {
        let (mut service, verification) = service();
        service.enqueue(TcPacket::new(APID, 17, 1, vec![]));
        service.enqueue(TcPacket::new(APID, 17, 1, vec![]).with_ack(AckFlags::NONE.with(AckFlag::Completion)));
        service.process();

        let reports = verification.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].stage, VerificationStage::Completion);
        assert!(reports[0].success);
    }

    #[test]
    fn test_register_replaces_handler() {
        let (mut service, verification) = service();
        service.register(1, custom_code);
        service.enqueue(tc(1, vec![]));
        service.process();
        assert!(service.state().seen.is_empty());
        assert_eq!(verification.reports()[0].code, Some(ErrorCode(0x100)));
    }

    #[test]
    fn test_inbox_from_other_thread() {
        let (mut service, _) = service();
        let inbox = service.inbox();
        let producer = thread::spawn(move || {
            let mut accepted = 0;
            for i in 0..10u8 {
                if inbox.push(tc(1, vec![i])) {
                    accepted += 1;
                }
            }
            assert!(!inbox.push(tc(9, vec![])));
            accepted
        });
        assert_eq!(producer.join().unwrap(), 10);
        assert_eq!(service.process(), 10);
        assert_eq!(service.state().seen.len(), 10);
        assert_eq!(service.state().seen[9], vec![9]);
    }

    #[test]
    fn test_update_reaches_state() {
        let (mut service, _) = service();
        service.update();
        service.update();
        assert_eq!(service.state().updates, 2);
    }
}
