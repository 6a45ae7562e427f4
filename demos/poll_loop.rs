//! A minimal host event loop sharing one `poll(2)` call between stdin and a
//! serial port.
//!
//! Lines typed on stdin are written to the port; anything the port receives
//! is printed as it arrives (active mode).
//!
//! ```bash
//! cargo run --example poll_loop -- /dev/ttyUSB0 115200
//! ```

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use parking_lot::Mutex;
    use std::io::{BufRead, Write};
    use std::os::unix::io::AsRawFd;
    use std::sync::Arc;
    use uart_engine::reactor::{add_poll_events, PollReactor};
    use uart_engine::{default_config, PortEngine, ReactorAdapter};

    let mut args = std::env::args().skip(1);
    let port = args.next().ok_or("usage: poll_loop <port> [speed]")?;
    let speed = args.next().map(|s| s.parse()).transpose()?.unwrap_or(9600);

    let failure: Arc<Mutex<Option<String>>> = Arc::default();
    let (write_failure, read_failure) = (Arc::clone(&failure), Arc::clone(&failure));
    let mut engine = PortEngine::new(
        move |done| {
            if let Err(e) = done.result {
                *write_failure.lock() = Some(e.to_string());
            }
        },
        |_| {},
    )
    .with_notify(move |arrived| match arrived {
        Ok(data) => {
            let mut stdout = std::io::stdout();
            let _ = stdout.write_all(&data);
            let _ = stdout.flush();
        }
        Err(e) => *read_failure.lock() = Some(e.to_string()),
    });
    engine.open(&port, &default_config().with_speed(speed))?;

    let stdin = std::io::stdin();
    let mut lines = stdin.lock();
    let mut reactor = PollReactor::new();
    let mut fds = [libc::pollfd {
        fd: -1,
        events: 0,
        revents: 0,
    }; 2];

    loop {
        fds[0] = libc::pollfd {
            fd: std::io::stdin().as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let mut timeout = -1;
        let count = 1 + add_poll_events(&engine, &mut fds[1..], &mut timeout);

        // SAFETY: `fds` outlives the call and holds `count` initialized entries.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), count as libc::nfds_t, timeout) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err.into());
        }
        if rc == 0 {
            reactor.on_timeout(&mut engine);
        }
        for fired in fds[1..count].iter().filter(|p| p.revents != 0) {
            reactor.on_ready(&mut engine, fired);
        }

        if fds[0].revents != 0 {
            let mut line = String::new();
            if lines.read_line(&mut line)? == 0 {
                break;
            }
            if !engine.has_pending_write() {
                engine.write(line.into_bytes(), None);
            }
        }

        if let Some(e) = failure.lock().take() {
            eprintln!("port error: {}", e);
            break;
        }
    }

    engine.close()?;
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("poll_loop needs poll(2); use uart-exerciser on this platform");
}
