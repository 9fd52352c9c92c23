use raplcap_raw::codec::{from_msr_power, from_msr_time, to_msr_power, to_msr_time};
use raplcap_raw::rapl::msr::MSR_RAPL_POWER_UNIT;
use raplcap_raw::rapl::{
    ConstraintLayout, RaplPowerUnit, ENERGY_COUNTER, ENERGY_COUNTER_MAX, LONG_TERM,
    POWER_LIMIT_LOCK, SHORT_TERM,
};
use raplcap_raw::RegisterLayout;

use crate::common::topology::cores_per_socket;
use crate::common::{MsrHandle, SysfsTopology, TopologyProvider};
use crate::config::Config;
use crate::error::{RaplcapError, Result};
use crate::rapl::types::RaplLimit;
use crate::zone::Zone;

static CONSTRAINTS: [ConstraintLayout; 2] = [LONG_TERM, SHORT_TERM];

/// Constraints defined for `zone`, long term first
fn constraints(zone: Zone) -> &'static [ConstraintLayout] {
    if zone.has_short_term() {
        &CONSTRAINTS
    } else {
        &CONSTRAINTS[..1]
    }
}

/// Map the result of an enabled check to a support answer
///
/// Any successful read counts as supported. An `EIO` from the read is
/// reported as supported as well; other errors are passed through.
fn supported_from(enabled: Result<bool>) -> Result<bool> {
    match enabled {
        Ok(_) => Ok(true),
        Err(e) if e.is_no_such_domain() => Ok(true),
        Err(e) => Err(e),
    }
}

fn decode_limit(value: u64, layout: &ConstraintLayout, units: &Units) -> RaplLimit {
    RaplLimit {
        seconds: from_msr_time(
            layout.time_y.get(value),
            layout.time_f.get(value),
            units.time,
        ),
        watts: from_msr_power(layout.power.get(value), units.power),
    }
}

fn encode_limit(value: u64, layout: &ConstraintLayout, limit: &RaplLimit, units: &Units) -> u64 {
    let mut value = value;
    if limit.watts > 0.0 {
        value = layout
            .power
            .set(value, to_msr_power(limit.watts, units.power));
    }
    if limit.seconds > 0.0 {
        value = layout
            .time
            .set(value, to_msr_time(limit.seconds, units.time));
    }
    value
}

/// Scale factors from MSR_RAPL_POWER_UNIT, assumed equal on every socket
#[derive(Debug, Clone, Copy, Default)]
struct Units {
    power: f64,
    energy: f64,
    time: f64,
}

#[derive(Debug, Default)]
struct RaplState {
    /// One handle per socket, indexed by socket
    handles: Vec<MsrHandle>,
    units: Units,
}

/// RAPL power capping context for all sockets of the host
///
/// Created uninitialized; [`RaplCap::init`] discovers the sockets, opens
/// one MSR device per socket and reads the unit register. Every query or
/// update afterwards is a fresh read (or read-modify-write) of the live
/// register; nothing is cached besides the unit scale factors.
///
/// There is no locking around read-modify-write sequences. Concurrent
/// writers to the same zone, including other processes and firmware, can
/// overwrite each other's changes.
pub struct RaplCap {
    config: Config,
    topology: Box<dyn TopologyProvider + Send>,
    nsockets: u32,
    state: Option<RaplState>,
    /// Re-read the read-only hint from the environment on every `init`
    env_read_only: bool,
}

impl Default for RaplCap {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl RaplCap {
    /// Uninitialized context using sysfs for topology discovery
    pub fn new(config: Config) -> Self {
        let topology = SysfsTopology::new(config.sysfs_cpu_root.clone());
        Self::with_topology(config, topology)
    }

    /// Uninitialized context with a custom topology source
    pub fn with_topology(
        config: Config,
        topology: impl TopologyProvider + Send + 'static,
    ) -> Self {
        Self {
            config,
            topology: Box::new(topology),
            nsockets: 0,
            state: None,
            env_read_only: false,
        }
    }

    /// Take the read-only hint from `RAPLCAP_READ_ONLY` at each `init`
    /// instead of from the config this context was built with
    pub fn with_env_read_only(mut self) -> Self {
        self.env_read_only = true;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }

    /// Discover sockets, open their MSR devices and read the unit register
    ///
    /// On failure every handle opened so far is closed and the context is
    /// left uninitialized. Initializing an initialized context tears the
    /// old state down first.
    pub fn init(&mut self) -> Result<()> {
        if self.is_initialized() {
            tracing::warn!("RAPL context already initialized, reinitializing");
            self.destroy()?;
        }
        if self.env_read_only {
            self.config.read_only = Config::from_env().read_only;
        }

        let nsockets = self.topology.socket_count()?;
        let cores = cores_per_socket(nsockets, &self.topology.core_socket_pairs()?)?;

        self.nsockets = nsockets;
        self.state = Some(RaplState::default());
        if let Err(e) = self.open_sockets(&cores) {
            if let Err(close_err) = self.destroy() {
                tracing::warn!("Cleanup after failed initialization: {}", close_err);
            }
            return Err(e);
        }

        tracing::info!("Initialized RAPL for {} socket(s)", nsockets);
        Ok(())
    }

    fn open_sockets(&mut self, cores: &[u32]) -> Result<()> {
        let state = self.state.as_mut().ok_or(RaplcapError::NotInitialized)?;
        for &core in cores {
            let handle = MsrHandle::open(&self.config.device_root, core, self.config.read_only)?;
            state.handles.push(handle);
        }

        let first = state.handles.first().ok_or(RaplcapError::NotInitialized)?;
        let unit = RaplPowerUnit::from_msr_value(first.read(MSR_RAPL_POWER_UNIT)?);
        state.units = Units {
            power: unit.power_unit_multiplier(),
            energy: unit.energy_unit_multiplier(),
            time: unit.time_unit_multiplier(),
        };
        tracing::debug!(
            "RAPL units: power={:.12} W, energy={:.12} J, time={:.12} s",
            state.units.power,
            state.units.energy,
            state.units.time
        );
        Ok(())
    }

    /// Close every open handle and drop per-socket state
    ///
    /// Safe to call on a context that is not initialized. Every handle is
    /// closed even if an earlier close fails; the last failure is returned.
    pub fn destroy(&mut self) -> Result<()> {
        let mut result = Ok(());
        if let Some(state) = self.state.take() {
            for (socket, handle) in state.handles.into_iter().enumerate() {
                tracing::debug!("destroy: socket={}, cpu={}", socket, handle.cpu_id());
                if let Err(e) = handle.close() {
                    result = Err(e);
                }
            }
            tracing::debug!("RAPL context destroyed");
        }
        self.nsockets = 0;
        result
    }

    /// Number of sockets, probing the topology if not initialized
    pub fn socket_count(&self) -> Result<u32> {
        if self.is_initialized() {
            return Ok(self.nsockets);
        }
        self.topology.socket_count()
    }

    fn state(&self, socket: u32) -> Result<&RaplState> {
        let state = self.state.as_ref().ok_or(RaplcapError::NotInitialized)?;
        if socket >= self.nsockets {
            return Err(RaplcapError::InvalidSocket {
                socket,
                nsockets: self.nsockets,
            });
        }
        Ok(state)
    }

    fn handle(&self, socket: u32) -> Result<&MsrHandle> {
        let state = self.state(socket)?;
        Ok(&state.handles[socket as usize])
    }

    fn read_limit_register(&self, socket: u32, zone: Zone) -> Result<u64> {
        self.handle(socket)?.read(zone.power_limit_msr())
    }

    /// Read, modify and write back a zone's power limit register
    fn update_limit_register(
        &self,
        socket: u32,
        zone: Zone,
        f: impl FnOnce(u64) -> u64,
    ) -> Result<()> {
        let handle = self.handle(socket)?;
        let msr = zone.power_limit_msr();
        let value = handle.read(msr)?;
        handle.write(msr, f(value))
    }

    /// Whether the zone exists on this socket
    ///
    /// Never reports `false`; an unreadable zone yields either `true` or
    /// an error, see [`RaplcapError::is_no_such_domain`].
    pub fn is_zone_supported(&self, socket: u32, zone: Zone) -> Result<bool> {
        let supported = supported_from(self.is_zone_enabled(socket, zone));
        tracing::debug!(
            "is_zone_supported: socket={}, zone={}, supported={:?}",
            socket,
            zone,
            supported.as_ref().ok()
        );
        supported
    }

    /// Whether every constraint of the zone has its enable and clamp bits set
    ///
    /// A zone whose constraints are enabled but not clamped is also
    /// reported as enabled, with a warning.
    pub fn is_zone_enabled(&self, socket: u32, zone: Zone) -> Result<bool> {
        let value = self.read_limit_register(socket, zone)?;
        let layouts = constraints(zone);

        let mut enabled = layouts.iter().all(|c| c.enable_clamp.is_set(value));
        if !enabled && layouts.iter().all(|c| c.enable.is_set(value)) {
            tracing::warn!(
                "Zone is enabled but clamping is not - use set_zone_enabled(...) to enable clamping"
            );
            enabled = true;
        }

        tracing::debug!(
            "is_zone_enabled: socket={}, zone={}, enabled={}",
            socket,
            zone,
            enabled
        );
        Ok(enabled)
    }

    /// Set or clear the enable and clamp bits of every constraint together
    pub fn set_zone_enabled(&self, socket: u32, zone: Zone, enabled: bool) -> Result<()> {
        tracing::debug!(
            "set_zone_enabled: socket={}, zone={}, enabled={}",
            socket,
            zone,
            enabled
        );
        let bits = if enabled { 0x3 } else { 0x0 };
        self.update_limit_register(socket, zone, |value| {
            constraints(zone)
                .iter()
                .fold(value, |v, c| c.enable_clamp.set(v, bits))
        })
    }

    /// Whether every constraint of the zone has its clamp bit set
    pub fn is_zone_clamped(&self, socket: u32, zone: Zone) -> Result<bool> {
        let value = self.read_limit_register(socket, zone)?;
        let clamped = constraints(zone).iter().all(|c| c.clamp.is_set(value));
        tracing::debug!(
            "is_zone_clamped: socket={}, zone={}, clamped={}",
            socket,
            zone,
            clamped
        );
        Ok(clamped)
    }

    /// Set or clear the clamp bit of every constraint, leaving enable bits alone
    pub fn set_zone_clamped(&self, socket: u32, zone: Zone, clamped: bool) -> Result<()> {
        tracing::debug!(
            "set_zone_clamped: socket={}, zone={}, clamped={}",
            socket,
            zone,
            clamped
        );
        self.update_limit_register(socket, zone, |value| {
            constraints(zone)
                .iter()
                .fold(value, |v, c| c.clamp.set(v, clamped as u64))
        })
    }

    pub fn is_zone_locked(&self, socket: u32, zone: Zone) -> Result<bool> {
        let value = self.read_limit_register(socket, zone)?;
        let locked = POWER_LIMIT_LOCK.is_set(value);
        tracing::debug!(
            "is_zone_locked: socket={}, zone={}, locked={}",
            socket,
            zone,
            locked
        );
        Ok(locked)
    }

    /// Lock the zone's power limit register until the next processor reset
    pub fn set_zone_locked(&self, socket: u32, zone: Zone) -> Result<()> {
        tracing::debug!("set_zone_locked: socket={}, zone={}", socket, zone);
        self.update_limit_register(socket, zone, |value| POWER_LIMIT_LOCK.set(value, 1))
    }

    /// Decode the zone's constraints
    ///
    /// `limit_short` is only written for zones with a short term
    /// constraint; otherwise it is left as the caller passed it.
    pub fn get_limits(
        &self,
        socket: u32,
        zone: Zone,
        limit_long: Option<&mut RaplLimit>,
        limit_short: Option<&mut RaplLimit>,
    ) -> Result<()> {
        let state = self.state(socket)?;
        let value = state.handles[socket as usize].read(zone.power_limit_msr())?;

        if let Some(limit) = limit_long {
            *limit = decode_limit(value, &LONG_TERM, &state.units);
            tracing::debug!(
                "get_limits: socket={}, zone={}, long_term: time={:.12} s, power={:.12} W",
                socket,
                zone,
                limit.seconds,
                limit.watts
            );
        }
        if let (Some(limit), true) = (limit_short, zone.has_short_term()) {
            // may be hard-coded in hardware, ignoring software writes
            *limit = decode_limit(value, &SHORT_TERM, &state.units);
            tracing::debug!(
                "get_limits: socket={}, zone={}, short_term: time={:.12} s, power={:.12} W",
                socket,
                zone,
                limit.seconds,
                limit.watts
            );
        }
        Ok(())
    }

    /// Replace the supplied fields of the zone's constraints
    ///
    /// Only fields greater than zero are written. `limit_short` is ignored
    /// for zones without a short term constraint.
    pub fn set_limits(
        &self,
        socket: u32,
        zone: Zone,
        limit_long: Option<&RaplLimit>,
        limit_short: Option<&RaplLimit>,
    ) -> Result<()> {
        let state = self.state(socket)?;
        let units = state.units;

        self.update_limit_register(socket, zone, |mut value| {
            if let Some(limit) = limit_long {
                tracing::debug!(
                    "set_limits: socket={}, zone={}, long_term: time={:.12} s, power={:.12} W",
                    socket,
                    zone,
                    limit.seconds,
                    limit.watts
                );
                value = encode_limit(value, &LONG_TERM, limit, &units);
            }
            if let (Some(limit), true) = (limit_short, zone.has_short_term()) {
                tracing::debug!(
                    "set_limits: socket={}, zone={}, short_term: time={:.12} s, power={:.12} W",
                    socket,
                    zone,
                    limit.seconds,
                    limit.watts
                );
                value = encode_limit(value, &SHORT_TERM, limit, &units);
            }
            value
        })
    }

    /// Current value of the zone's energy counter in joules
    pub fn get_energy_counter(&self, socket: u32, zone: Zone) -> Result<f64> {
        let state = self.state(socket)?;
        let value = state.handles[socket as usize].read(zone.energy_status_msr())?;
        let joules = ENERGY_COUNTER.get(value) as f64 * state.units.energy;
        tracing::debug!(
            "get_energy_counter: socket={}, zone={}, energy={:.12} J",
            socket,
            zone,
            joules
        );
        Ok(joules)
    }

    /// Value in joules at which the zone's energy counter wraps
    pub fn get_energy_counter_max(&self, socket: u32, zone: Zone) -> Result<f64> {
        let state = self.state(socket)?;
        let joules = ENERGY_COUNTER_MAX as f64 * state.units.energy;
        tracing::debug!(
            "get_energy_counter_max: socket={}, zone={}, max={:.12} J",
            socket,
            zone,
            joules
        );
        Ok(joules)
    }
}
