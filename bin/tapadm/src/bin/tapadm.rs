// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2025 Oxide Computer Company

use std::thread;
use std::time::Duration;
use std::time::Instant;

use clap::Parser;
use slog::Drain;
use slog::Logger;
use slog::info;
use slog::o;

use linux_sys_hdrs::TunFlags;
use tap_api::MAX_QUEUES;
use tap_pmd::config::TapArgs;
use tap_pmd::driver::TapDriver;
use tap_pmd::ethdev::EthDevOps;
use tap_pmd::os::tun::LinuxTun;
use tap_pmd::print::print_dev_info;
use tap_pmd::print::print_port_info;
use tap_pmd::print::print_stats;
use tap_pmd::provider::TapProvider;
use tapadm::bring_up;
use tapadm::poll_once;
use tapadm::report;

/// Drive a poll-mode port over a Linux TAP interface
#[derive(Debug, Parser)]
#[command(version)]
enum Command {
    /// Print the TUN/TAP features the kernel supports.
    Features,

    /// Create a port, poll it for a while, and report what it saw.
    Run {
        /// Device arguments, e.g. "iface=dtap0,speed=10000".
        #[arg(long, default_value = "")]
        devargs: String,

        /// Number of queue pairs.
        #[arg(long, default_value_t = 1)]
        queues: u16,

        /// Buffers in each queue's pool.
        #[arg(long, default_value_t = 512)]
        pool_size: usize,

        /// Maximum frames per receive burst.
        #[arg(long, default_value_t = 32)]
        burst: u16,

        /// How long to poll for.
        #[arg(long, default_value_t = 10)]
        seconds: u64,

        /// Send every received frame back out the queue it came in on.
        #[arg(long)]
        reflect: bool,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

fn logger() -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_envlogger::new(drain);
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!("prog" => "tapadm"))
}

fn print_features(features: TunFlags) {
    println!("TUN features {:#06x}", features.bits());
    for (name, _) in features.iter_names() {
        println!("  {name}");
    }
}

#[allow(clippy::too_many_arguments)]
fn run(
    log: &Logger,
    devargs: &str,
    queues: u16,
    pool_size: usize,
    burst: u16,
    seconds: u64,
    reflect: bool,
    json: bool,
) -> anyhow::Result<()> {
    if queues == 0 || queues > MAX_QUEUES {
        anyhow::bail!("queues must be between 1 and {MAX_QUEUES}");
    }
    let args = devargs
        .parse::<TapArgs>()
        .map_err(|e| anyhow::anyhow!("invalid devargs: {e}"))?
        .with_queues(queues);

    let drv = TapDriver::new(LinuxTun::new(), log);
    let port = drv.probe("net_tap0", args)?;
    let _pools = bring_up(&port, pool_size)?;
    info!(log, "polling"; "port" => port.name(), "iface" => port.iface(),
        "seconds" => seconds, "reflect" => reflect);

    let deadline = Instant::now() + Duration::from_secs(seconds);
    let mut received = 0u64;
    while Instant::now() < deadline {
        let n = poll_once(&port, burst, reflect);
        if n == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        received += n;
    }
    info!(log, "done polling"; "received" => received);

    let rep = report(&port);
    if json {
        println!("{}", serde_json::to_string_pretty(&rep)?);
    } else {
        print_port_info(&rep.info)?;
        println!();
        print_dev_info(&rep.dev_info)?;
        println!();
        print_stats(&rep.stats)?;
    }

    port.dev_stop()?;
    drv.remove(port.name())?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cmd = Command::parse();
    let log = logger();

    match cmd {
        Command::Features => {
            print_features(LinuxTun::new().features()?);
        }

        Command::Run {
            devargs,
            queues,
            pool_size,
            burst,
            seconds,
            reflect,
            json,
        } => {
            run(
                &log, &devargs, queues, pool_size, burst, seconds, reflect,
                json,
            )?;
        }
    }

    Ok(())
}
