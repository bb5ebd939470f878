//! Run this with administrator privileges where it is required
//! in order to open the packet socket and bind the DHCP client ports.
//! Works only under linux.
//!
//!     demo <interface> [v4|v6]
//!
//! Without a family argument both protocols run side by side. Leases are
//! kept under /var/lib/dhcp-client and addresses are configured through
//! ip(8). An interrupt releases the leases and exits.

#[macro_use]
extern crate log;

#[cfg(target_os = "linux")]
fn main() {
    imp::run()
}

#[cfg(not(target_os = "linux"))]
fn main() {
    eprintln!("This demonstration works only under linux.");
}

#[cfg(target_os = "linux")]
mod imp {
    use std::{
        io,
        os::unix::io::RawFd,
        sync::atomic::{AtomicI32, Ordering},
    };

    use dhcp_client::{ClientConfig, Daemon, Event};
    use dhcp_eloop::{EventLoop, Wake};
    use dhcp_platform::{
        linux::{interface, LinuxPlatform, ShellConfigurator},
        store::FileLeaseStore,
        Family,
    };

    const LEASE_DIRECTORY: &str = "/var/lib/dhcp-client";

    static SIGNAL_WRITE: AtomicI32 = AtomicI32::new(-1);

    extern "C" fn on_signal(_signal: libc::c_int) {
        let fd = SIGNAL_WRITE.load(Ordering::Relaxed);
        if fd >= 0 {
            unsafe { libc::write(fd, [0u8].as_ptr() as *const libc::c_void, 1) };
        }
    }

    /// Opens the self pipe and routes SIGINT and SIGTERM into its write
    /// end, so the reactor sees the interrupt as an ordinary readable fd.
    fn signal_pipe() -> io::Result<RawFd> {
        let mut fds = [0 as libc::c_int; 2];
        if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) } != 0 {
            return Err(io::Error::last_os_error());
        }
        SIGNAL_WRITE.store(fds[1], Ordering::Relaxed);
        unsafe {
            libc::signal(libc::SIGINT, on_signal as libc::sighandler_t);
            libc::signal(libc::SIGTERM, on_signal as libc::sighandler_t);
        }
        Ok(fds[0])
    }

    pub fn run() {
        if std::env::var("RUST_LOG").is_err() {
            std::env::set_var("RUST_LOG", "info");
        }
        env_logger::init();

        let args: Vec<String> = std::env::args().collect();
        let name = match args.get(1) {
            Some(name) => name.to_owned(),
            None => {
                eprintln!("usage: demo <interface> [v4|v6]");
                std::process::exit(2);
            }
        };
        let families: Vec<Family> = match args.get(2).map(String::as_str) {
            None => vec![Family::Ipv4, Family::Ipv6],
            Some("v4") => vec![Family::Ipv4],
            Some("v6") => vec![Family::Ipv6],
            Some(other) => {
                eprintln!("unknown family {:?}, expected v4 or v6", other);
                std::process::exit(2);
            }
        };

        let interface = interface(&name).expect("the interface must exist");
        info!(
            "{}: index {}, hardware address {}",
            interface.name, interface.index, interface.hardware_address
        );

        let config = ClientConfig {
            release_on_stop: true,
            ..ClientConfig::default()
        };
        let mut daemon = Daemon::new(
            config,
            Box::new(LinuxPlatform),
            Box::new(FileLeaseStore::new(LEASE_DIRECTORY)),
            Box::new(ShellConfigurator),
        )
        .expect("the default configuration is valid");
        daemon
            .on_conflict(|name, address| warn!("{}: {} is claimed by another host", name, address));

        let mut eloop = EventLoop::new();

        let signal = signal_pipe().expect("a signal pipe must open");
        eloop
            .register_io(signal, Some(Event::Signal), None)
            .expect("the signal pipe registers");

        for family in families {
            if let Err(error) = daemon.start(&mut eloop, interface.clone(), family) {
                error!("{}: DHCP{} failed to start: {}", interface.name, family, error);
            }
        }

        let code = eloop
            .run(|eloop, wake| match wake {
                Wake::Readable {
                    event: Event::Signal,
                    ..
                } => {
                    info!("{}: interrupted, shutting down", name);
                    daemon.stop(eloop, &name);
                    eloop.exit(0);
                }
                wake => daemon.dispatch(eloop, wake),
            })
            .expect("the reactor must not fail");
        std::process::exit(code);
    }
}
