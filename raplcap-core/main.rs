use std::fmt;

use anyhow::{bail, Context};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use raplcap::config::ENV_RAPLCAP_READ_ONLY;
use raplcap::{with_context, RaplCap, RaplLimit, Zone};

#[derive(Parser, Debug)]
#[command(name = "rapl-configure")]
#[command(about = "Get or set Intel RAPL power limits through the MSR driver")]
#[command(
    after_help = "Current values are printed if no flags, or only package and/or zone flags, are specified.\n\
Otherwise, specified values are set while other values remain unmodified.\n\
When setting values, zones are automatically enabled unless -e/--enabled is explicitly set to 0."
)]
struct Args {
    #[arg(
        short = 'n',
        long = "npackages",
        visible_alias = "nsockets",
        help = "Print the number of packages found and exit"
    )]
    npackages: bool,

    #[arg(
        short = 'c',
        long = "package",
        visible_alias = "socket",
        default_value_t = 0,
        help = "The processor package"
    )]
    package: u32,

    #[arg(
        short,
        long,
        default_value_t = Zone::Package,
        help = "Which zone to use: PACKAGE, CORE, UNCORE (client only), DRAM (server only), PSYS (Skylake and newer)"
    )]
    zone: Zone,

    #[arg(short, long, value_parser = parse_switch, help = "Enable/disable a zone (1|0)")]
    enabled: Option<bool>,

    #[arg(short = 's', long = "seconds0", value_parser = parse_positive, help = "Long term time window")]
    seconds_long: Option<f64>,

    #[arg(short = 'w', long = "watts0", value_parser = parse_positive, help = "Long term power limit")]
    watts_long: Option<f64>,

    #[arg(
        short = 'S',
        long = "seconds1",
        value_parser = parse_positive,
        help = "Short term time window (PACKAGE & PSYS only)"
    )]
    seconds_short: Option<f64>,

    #[arg(
        short = 'W',
        long = "watts1",
        value_parser = parse_positive,
        help = "Short term power limit (PACKAGE & PSYS only)"
    )]
    watts_short: Option<f64>,

    #[arg(
        short = 'C',
        long,
        value_parser = parse_switch,
        help = "Clamp/unclamp a zone (1|0); enabling sets clamping, so pass 0 explicitly when setting limits"
    )]
    clamped: Option<bool>,

    #[arg(short = 'L', long, help = "Lock a zone (a core RESET is required to unlock)")]
    locked: bool,

    #[arg(short, long, help = "Enable verbose logging (shows all MSR read/write operations)")]
    verbose: bool,
}

impl Args {
    fn long_limit(&self) -> Option<RaplLimit> {
        limit_from(self.seconds_long, self.watts_long)
    }

    fn short_limit(&self) -> Option<RaplLimit> {
        limit_from(self.seconds_short, self.watts_short)
    }

    fn is_read_only(&self) -> bool {
        self.enabled.is_none()
            && self.long_limit().is_none()
            && self.short_limit().is_none()
            && self.clamped.is_none()
            && !self.locked
    }
}

fn limit_from(seconds: Option<f64>, watts: Option<f64>) -> Option<RaplLimit> {
    if seconds.is_none() && watts.is_none() {
        return None;
    }
    Some(RaplLimit::new(seconds.unwrap_or(0.0), watts.unwrap_or(0.0)))
}

/// Parse "1"/"0" style switches; any non-zero integer is true
fn parse_switch(s: &str) -> Result<bool, String> {
    s.trim()
        .parse::<i64>()
        .map(|v| v != 0)
        .map_err(|_| format!("expected 1 or 0, got {s:?}"))
}

fn parse_positive(s: &str) -> Result<f64, String> {
    match s.trim().parse::<f64>() {
        Ok(v) if v > 0.0 => Ok(v),
        _ => Err("Time window and power limit values must be > 0".to_string()),
    }
}

/// Current state of one zone, as printed in read-only mode
#[derive(Debug, Default)]
struct ZoneReport {
    enabled: Option<bool>,
    clamped: Option<bool>,
    locked: Option<bool>,
    long: RaplLimit,
    short: RaplLimit,
    joules: Option<f64>,
    joules_max: Option<f64>,
}

impl fmt::Display for ZoneReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |v: Option<bool>| match v {
            Some(true) => "true",
            Some(false) => "false",
            None => "unknown",
        };
        writeln!(f, "{:>13}: {}", "enabled", flag(self.enabled))?;
        writeln!(f, "{:>13}: {}", "clamped", flag(self.clamped))?;
        writeln!(f, "{:>13}: {}", "locked", flag(self.locked))?;
        // a time window is never 0, so a positive one means the short term constraint exists
        if self.short.seconds > 0.0 {
            writeln!(f, "{:>13}: {:.12}", "watts_long", self.long.watts)?;
            writeln!(f, "{:>13}: {:.12}", "seconds_long", self.long.seconds)?;
            writeln!(f, "{:>13}: {:.12}", "watts_short", self.short.watts)?;
            writeln!(f, "{:>13}: {:.12}", "seconds_short", self.short.seconds)?;
        } else {
            writeln!(f, "{:>13}: {:.12}", "watts", self.long.watts)?;
            writeln!(f, "{:>13}: {:.12}", "seconds", self.long.seconds)?;
        }
        if let Some(joules) = self.joules {
            writeln!(f, "{:>13}: {:.12}", "joules", joules)?;
        }
        if let Some(joules_max) = self.joules_max {
            writeln!(f, "{:>13}: {:.12}", "joules_max", joules_max)?;
        }
        Ok(())
    }
}

fn print_error_continue(msg: &str, e: &raplcap::RaplcapError) {
    eprintln!("{msg}: {e}");
    eprintln!("Trying to proceed anyway...");
}

fn get_limits(rc: &RaplCap, package: u32, zone: Zone) -> anyhow::Result<()> {
    let optional = |msg: &str, result: raplcap::Result<bool>| {
        result
            .map_err(|e| print_error_continue(msg, &e))
            .ok()
    };

    let mut report = ZoneReport {
        enabled: optional(
            "Failed to determine if zone is enabled",
            rc.is_zone_enabled(package, zone),
        ),
        locked: optional(
            "Failed to determine if zone is locked",
            rc.is_zone_locked(package, zone),
        ),
        clamped: optional(
            "Failed to determine if zone is clamped",
            rc.is_zone_clamped(package, zone),
        ),
        ..Default::default()
    };

    rc.get_limits(
        package,
        zone,
        Some(&mut report.long),
        Some(&mut report.short),
    )
    .context("Failed to get limits")?;

    // energy counter information is optional
    report.joules = rc.get_energy_counter(package, zone).ok();
    report.joules_max = rc.get_energy_counter_max(package, zone).ok();

    print!("{report}");
    Ok(())
}

fn configure_limits(rc: &RaplCap, args: &Args) -> anyhow::Result<()> {
    let long = args.long_limit();
    let short = args.short_limit();
    if long.is_some() || short.is_some() {
        rc.set_limits(args.package, args.zone, long.as_ref(), short.as_ref())
            .context("Failed to set limits")?;
    }

    // enable/disable if requested, otherwise automatically enable
    rc.set_zone_enabled(args.package, args.zone, args.enabled.unwrap_or(true))
        .context("Failed to enable/disable zone")?;

    // enabling also sets clamping, so an explicit clamp request is applied afterwards
    if let Some(clamped) = args.clamped {
        rc.set_zone_clamped(args.package, args.zone, clamped)
            .context("Failed to clamp/unclamp zone")?;
    }
    if args.locked {
        rc.set_zone_locked(args.package, args.zone)
            .context("Failed to lock zone")?;
    }
    Ok(())
}

fn execute(rc: &RaplCap, args: &Args, read_only: bool) -> anyhow::Result<()> {
    match rc.is_zone_supported(args.package, args.zone) {
        Ok(true) => {}
        Ok(false) => bail!("Zone not supported"),
        Err(e) => print_error_continue("Failed to determine if zone is supported", &e),
    }

    if read_only {
        get_limits(rc, args.package, args.zone)
    } else {
        configure_limits(rc, args)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup logging based on verbose flag, RUST_LOG takes precedence
    let default_level = if args.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    // counting packages does not need a privileged, initialized context
    if args.npackages {
        let count = with_context(None, |rc| rc.socket_count())
            .context("Failed to get number of packages")?;
        println!("{count}");
        return Ok(());
    }

    let read_only = args.is_read_only();
    if read_only && std::env::var_os(ENV_RAPLCAP_READ_ONLY).is_none() {
        // request read-only access before the default context is built
        std::env::set_var(ENV_RAPLCAP_READ_ONLY, "1");
    }

    with_context(None, |rc| {
        rc.init().context("Failed to initialize")?;
        let result = execute(rc, &args, read_only);
        if let Err(e) = rc.destroy() {
            eprintln!("Failed to clean up: {e}");
        }
        result
    })
}
