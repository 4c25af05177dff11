use crate::bgp::RouteTable;
use crate::codec::{self, Encoder, Reply, MAX_PACKET_SIZE};
use crate::config::{ScanConfig, TimeUnit};
use crate::constants::{
    ENTIRE_STARTUP_DELAY, MAX_NULL_READS, NULL_READ_WAIT, PROGRESS_MIN_PROBES, PROGRESS_STEPS,
};
use crate::enumerate::Enumerator;
use crate::error::{IoError, IoOperation, Result};
use crate::histogram::{poisson_pmf, TtlController};
use crate::net::platform::Ipv4ByteOrder;
use crate::net::{ProbeSender, ReplyReceiver};
use crate::pacer::Pacer;
use crate::record::RecordWriter;
use crate::stats::{Counter, Snapshot, Stats};
use crate::types::{Anomaly, Target};
use chrono::{Local, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::instrument;

/// How often a sleeping sender or drain checks for a stop request.
const STOP_POLL: Duration = Duration::from_millis(100);

/// The network endpoints of a scan.
///
/// Either half may be absent: a dry run has no sender and a probe-only scan no receiver.
#[derive(Debug)]
pub struct Endpoints<S, R> {
    pub source_addr: IpAddr,
    pub byte_order: Ipv4ByteOrder,
    pub sender: Option<S>,
    pub receiver: Option<R>,
}

/// A stateless traceroute scan.
///
/// Use the [`crate::Builder`] type to create a [`Scanner`].
#[derive(Debug)]
pub struct Scanner {
    config: ScanConfig,
    routes: Option<Arc<RouteTable>>,
    stop: Arc<AtomicBool>,
}

impl Scanner {
    pub(crate) fn new(config: ScanConfig, routes: Option<RouteTable>) -> Self {
        Self {
            config,
            routes: routes.map(Arc::new),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ScanConfig {
        &self.config
    }

    #[must_use]
    pub fn routes(&self) -> Option<&RouteTable> {
        self.routes.as_deref()
    }

    /// A flag which, once set, ends the scan early.
    #[must_use]
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Run the scan over the raw sockets of this host, writing records to `out`.
    ///
    /// This blocks until the scan completes.  Sending and receiving raw packets requires the
    /// `CAP_NET_RAW` capability on Linux.
    #[cfg(unix)]
    #[instrument(skip_all, level = "debug")]
    pub fn run<W: Write + Send>(&self, out: W) -> Result<Snapshot> {
        use crate::lock::InstanceLock;
        use crate::net::channel;
        use crate::net::source::SourceAddr;
        use crate::net::{PlatformImpl, SocketImpl};

        let source_addr = match self.config.source_addr {
            Some(addr) => SourceAddr::validate::<SocketImpl>(addr)?,
            None => SourceAddr::discover::<PlatformImpl>(
                self.discovery_target(),
                self.config.dest_port,
            )?,
        };
        tracing::info!(%source_addr, "source address");
        let mut writer = RecordWriter::new(out);
        if self.config.testing {
            let endpoints: Endpoints<channel::SendChannel<SocketImpl>, _> = Endpoints {
                source_addr,
                byte_order: Ipv4ByteOrder::Network,
                sender: None,
                receiver: None::<channel::RecvChannel<SocketImpl>>,
            };
            return self.run_with(endpoints, &mut writer);
        }
        let _lock = InstanceLock::acquire(self.config.instance, self.config.lock_dir.as_deref())?;
        let byte_order = Ipv4ByteOrder::for_address(source_addr)?;
        let (sender, receiver) = channel::connect::<SocketImpl>(source_addr)?;
        let endpoints = Endpoints {
            source_addr,
            byte_order,
            sender: self.config.probe_mode.probes().then_some(sender),
            receiver: self.config.probe_mode.receives().then_some(receiver),
        };
        self.run_with(endpoints, &mut writer)
    }

    /// Run the scan over the given endpoints.
    ///
    /// Probes are sent from the current thread while replies are read on a second thread.  The
    /// final counters are written to the trailer of `writer` and returned.
    #[instrument(skip_all, level = "debug")]
    pub fn run_with<S, R, W>(
        &self,
        endpoints: Endpoints<S, R>,
        writer: &mut RecordWriter<W>,
    ) -> Result<Snapshot>
    where
        S: ProbeSender,
        R: ReplyReceiver,
        W: Write + Send,
    {
        let Endpoints {
            source_addr,
            byte_order,
            sender,
            receiver,
        } = endpoints;
        let stats = Arc::new(Stats::new());
        let mut enumerator = Enumerator::new(&self.config, self.routes.clone(), stats.clone())?;
        let encoder = Encoder::new(
            self.config.probe_type,
            source_addr,
            self.config.dest_port,
            self.config.instance,
        )
        .with_byte_order(byte_order);
        let shared = Shared {
            config: &self.config,
            routes: self.routes.as_deref(),
            stats: &stats,
            ttls: TtlController::new(usize::from(self.config.max_ttl.0) + 1, self.config.time_unit),
            clock: Clock::start(self.config.time_unit),
            prober: Mutex::new(Prober { encoder, sender }),
            stop: &self.stop,
            finished: AtomicBool::new(false),
        };
        writer.write_header(&self.config, source_addr, Local::now())?;
        let gate = Mutex::new(());
        let result = thread::scope(|scope| {
            let startup = gate.lock();
            let listener = match receiver {
                Some(receiver) => {
                    let (shared, gate, writer) = (&shared, &gate, &mut *writer);
                    let handle = thread::Builder::new()
                        .name(String::from("yarrp-receiver"))
                        .spawn_scoped(scope, move || {
                            drop(gate.lock());
                            Listener::new(shared, receiver, writer).run()
                        })
                        .map_err(|err| IoError::Other(err, IoOperation::SpawnThread))?;
                    Some(handle)
                }
                None => None,
            };
            drop(startup);
            let sent = if self.config.probe_mode.probes() {
                shared.send_all(&mut enumerator)
            } else {
                Ok(())
            };
            if sent.is_ok() && listener.is_some() {
                if self.config.probe_mode.probes() {
                    let wait = self.config.shutdown_wait;
                    tracing::info!(?wait, "waiting for outstanding replies");
                    shared.sleep(wait);
                } else {
                    while !shared.stopped() {
                        thread::sleep(STOP_POLL);
                    }
                }
            }
            shared.finished.store(true, Ordering::Relaxed);
            let received = listener.map_or(Ok(()), |handle| {
                handle.join().unwrap_or_else(|_| {
                    tracing::error!("receiver thread panicked");
                    Ok(())
                })
            });
            sent.and(received)
        });
        let snapshot = stats.snapshot(shared.clock.started.elapsed());
        if tracing::enabled!(tracing::Level::DEBUG) {
            shared.ttls.dump();
        }
        writer.write_trailer(&snapshot, Local::now())?;
        result.map(|()| snapshot)
    }

    /// An address used to discover the source address which routes towards the targets.
    fn discovery_target(&self) -> IpAddr {
        use crate::config::Targets;
        use crate::constants::{DISCOVERY_TARGET_V4, DISCOVERY_TARGET_V6};
        match &self.config.targets {
            Targets::List { addrs, .. } => addrs.first().copied(),
            Targets::Subnets(subnets) => subnets.first().map(ipnetwork::IpNetwork::network),
            Targets::Entire => None,
        }
        .unwrap_or(if self.config.is_ipv6() {
            IpAddr::V6(DISCOVERY_TARGET_V6)
        } else {
            IpAddr::V4(DISCOVERY_TARGET_V4)
        })
    }
}

/// The scan clock, in the configured time unit since the scan started.
#[derive(Debug)]
struct Clock {
    started: Instant,
    unit: TimeUnit,
}

impl Clock {
    fn start(unit: TimeUnit) -> Self {
        Self {
            started: Instant::now(),
            unit,
        }
    }

    fn elapsed(&self) -> u32 {
        self.unit.ticks(self.started.elapsed())
    }
}

/// Encodes and sends probes, or logs them in a dry run.
struct Prober<S> {
    encoder: Encoder,
    sender: Option<S>,
}

impl<S: ProbeSender> Prober<S> {
    fn probe(&mut self, target: Target, elapsed: u32) -> Result<()> {
        match &mut self.sender {
            Some(sender) => {
                let packet = self.encoder.encode(target, elapsed)?;
                sender.send_probe(packet, target.addr)
            }
            None => {
                tracing::debug!(%target, elapsed, "dry run probe");
                Ok(())
            }
        }
    }
}

/// State shared by the sending and receiving threads.
struct Shared<'a, S> {
    config: &'a ScanConfig,
    routes: Option<&'a RouteTable>,
    stats: &'a Stats,
    ttls: TtlController,
    clock: Clock,
    prober: Mutex<Prober<S>>,
    stop: &'a AtomicBool,
    finished: AtomicBool,
}

impl<S: ProbeSender> Shared<'_, S> {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn finished(&self) -> bool {
        self.stopped() || self.finished.load(Ordering::Relaxed)
    }

    /// Sleep for `duration` or until a stop is requested.
    fn sleep(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while !self.stopped() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(STOP_POLL.min(deadline - now));
        }
    }

    /// Probe every target of `enumerator` which survives the scan policy.
    #[instrument(skip_all, level = "debug")]
    fn send_all(&self, enumerator: &mut Enumerator) -> Result<()> {
        let entire = self.config.targets.is_entire();
        if entire {
            tracing::info!(delay = ?ENTIRE_STARTUP_DELAY, "entire Internet scan starting");
            self.sleep(ENTIRE_STARTUP_DELAY);
        }
        let to_probe = enumerator.total();
        self.stats.set_to_probe(to_probe);
        let progress_every = if to_probe > PROGRESS_MIN_PROBES {
            to_probe / PROGRESS_STEPS
        } else {
            0
        };
        let mut pacer = Pacer::new(self.config.rate);
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        tracing::info!(to_probe, rate = self.config.rate, "probing begins");
        while let Some(target) = enumerator.next_address() {
            if self.stopped() {
                tracing::info!("probing stopped");
                break;
            }
            let ttl = target.ttl.0;
            if self.config.poisson > 0
                && rng.gen::<f64>() > poisson_pmf(ttl, f64::from(self.config.poisson))
            {
                continue;
            }
            if ttl < self.config.neighborhood.0 {
                let open = if entire {
                    self.ttls.should_probe(ttl)
                } else {
                    self.ttls.should_probe_prob(ttl)
                };
                if !open {
                    self.stats.incr(Counter::NbrSkipped);
                    continue;
                }
                self.ttls.probed(ttl, self.clock.elapsed());
            }
            if let Some(routes) = self.routes {
                match routes.get(target.addr) {
                    None => {
                        tracing::trace!(%target, "outside bgp table");
                        self.stats.incr(Counter::BgpOutside);
                        continue;
                    }
                    Some(route) if route.is_blocked() => {
                        self.stats.incr(Counter::AdrOutside);
                        continue;
                    }
                    Some(route) => route.status.lock().probed(ttl, self.clock.elapsed()),
                }
            }
            self.prober.lock().probe(target, self.clock.elapsed())?;
            let count = self.stats.incr(Counter::Count);
            if progress_every > 0 && count % progress_every == 0 {
                tracing::info!("{}", self.stats.snapshot(self.clock.started.elapsed()));
            }
            if self.config.count.is_some_and(|limit| count >= limit) {
                tracing::info!(count, "probe limit reached");
                break;
            }
            pacer.wait();
        }
        tracing::info!(sent = self.stats.get(Counter::Count), "probing complete");
        Ok(())
    }
}

/// Reads, decodes and records replies.
struct Listener<'a, 's, S, R, W: Write> {
    shared: &'s Shared<'a, S>,
    receiver: R,
    writer: &'s mut RecordWriter<W>,
    null_reads: u32,
}

impl<'a, 's, S, R, W> Listener<'a, 's, S, R, W>
where
    S: ProbeSender,
    R: ReplyReceiver,
    W: Write,
{
    fn new(shared: &'s Shared<'a, S>, receiver: R, writer: &'s mut RecordWriter<W>) -> Self {
        Self {
            shared,
            receiver,
            writer,
            null_reads: 0,
        }
    }

    #[instrument(skip_all, level = "debug")]
    fn run(mut self) -> Result<()> {
        let probing = self.shared.config.probe_mode.probes();
        let mut buf = [0_u8; MAX_PACKET_SIZE];
        while !self.shared.finished() {
            if probing && self.null_reads >= MAX_NULL_READS {
                tracing::info!(null_reads = self.null_reads, "receiver idle, stopping");
                break;
            }
            match self.receiver.recv_packet(&mut buf, NULL_READ_WAIT) {
                Ok(Some((len, hop))) => {
                    self.null_reads = 0;
                    self.handle(&buf[..len], hop)?;
                }
                Ok(None) => {
                    if probing {
                        self.null_reads += 1;
                        tracing::debug!(null_reads = self.null_reads, "receiver timeout");
                    }
                }
                Err(err) => {
                    self.null_reads += 1;
                    tracing::warn!(%err, "read error");
                }
            }
        }
        self.writer.flush()
    }

    fn handle(&mut self, packet: &[u8], hop: IpAddr) -> Result<()> {
        let shared = self.shared;
        let elapsed = shared.clock.elapsed();
        let decoded = if shared.config.is_ipv6() {
            codec::decode_v6(packet, hop, elapsed)
        } else {
            codec::decode_v4(packet, elapsed)
        };
        let reply = match decoded {
            Ok(Some(reply)) => reply,
            Ok(None) => return Ok(()),
            Err(err) => {
                tracing::debug!(%hop, %err, "undecodable reply");
                return Ok(());
            }
        };
        if reply.instance != shared.config.instance {
            shared.stats.incr(Counter::Foreign);
            return Ok(());
        }
        shared.stats.incr(Counter::Replies);
        if reply.anomalies.contains(Anomaly::BAD_DESTINATION) {
            shared.stats.incr(Counter::BadDst);
        }
        if reply.anomalies.contains(Anomaly::RTT_UNDERFLOW) {
            shared.stats.incr(Counter::RttAnomaly);
        }
        tracing::debug!(
            target = %reply.target,
            hop = %reply.hop,
            ttl = reply.ttl,
            rtt = reply.rtt,
            icmp_type = reply.icmp_type,
            icmp_code = reply.icmp_code,
            "reply"
        );
        if reply.is_valid() {
            self.fill(&reply, elapsed)?;
        }
        if reply.sport != 0 || reply.dport != 0 {
            self.writer
                .write_reply(&reply, Utc::now(), shared.stats.get(Counter::Count))?;
        }
        if reply.is_valid() {
            if let Some(route) = shared.routes.and_then(|routes| routes.get(reply.target)) {
                route.status.lock().result(reply.ttl, elapsed);
            }
            shared.ttls.add(reply.ttl, reply.hop, elapsed);
        }
        Ok(())
    }

    /// Probe one hop beyond the maximum TTL of a path which is still answering.
    fn fill(&self, reply: &Reply, elapsed: u32) -> Result<()> {
        let config = self.shared.config;
        if config.fill_enabled() && reply.ttl >= config.max_ttl.0 && reply.ttl < config.fill_ttl.0
        {
            self.shared.stats.incr(Counter::Fills);
            let target = Target::new(reply.target, reply.ttl + 1);
            tracing::trace!(%target, "fill");
            self.shared.prober.lock().probe(target, elapsed)?;
        }
        Ok(())
    }
}
