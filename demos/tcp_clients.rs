//! Pooled TCP connections to a local line-echo server.
//!
//! A client layer acquires a connection before each request and releases it
//! afterwards; the pool dials new sockets only when every open one is busy.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use respool::{PoolConfiguration, ResourcePool};

fn spawn_echo_server() -> io::Result<std::net::SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;

    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            thread::spawn(move || {
                let Ok(mut writer) = stream.try_clone() else {
                    return;
                };
                let reader = BufReader::new(stream);
                for line in reader.lines().map_while(Result::ok) {
                    if writeln!(writer, "{line}").is_err() {
                        break;
                    }
                }
            });
        }
    });

    Ok(addr)
}

/// Client that borrows a pooled connection per request
struct EchoClient {
    pool: ResourcePool<BufReader<TcpStream>>,
}

impl EchoClient {
    fn request(&self, message: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let mut conn = self.pool.acquire()?;
        writeln!(conn.get_mut(), "{message}")?;

        let mut reply = String::new();
        conn.read_line(&mut reply)?;
        self.pool.release(conn)?;
        Ok(reply.trim_end().to_string())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== respool - Pooled TCP Clients ===\n");

    let addr = spawn_echo_server()?;
    let config = PoolConfiguration::new()
        .with_initial_capacity(1)
        .with_max_idle(2)
        .with_max_capacity(3)
        .with_idle_timeout(Duration::from_secs(30))
        .with_acquire_timeout(Duration::from_secs(5))
        .with_factory(move || {
            let stream = TcpStream::connect(addr)?;
            println!("   Dialed {}", stream.local_addr()?);
            Ok(BufReader::new(stream))
        })
        .with_closer(|conn: BufReader<TcpStream>| {
            conn.get_ref().shutdown(Shutdown::Both)?;
            Ok(())
        })
        .with_health_check(|conn: &BufReader<TcpStream>| match conn.get_ref().take_error()? {
            None => Ok(()),
            Some(err) => Err(err.into()),
        });

    let client = std::sync::Arc::new(EchoClient {
        pool: ResourcePool::new(config)?,
    });

    let workers: Vec<_> = (0..6)
        .map(|worker| {
            let client = std::sync::Arc::clone(&client);
            thread::spawn(move || {
                for n in 0..3 {
                    match client.request(&format!("worker {worker} message {n}")) {
                        Ok(reply) => println!("   echo: {reply}"),
                        Err(e) => println!("   request failed: {e}"),
                    }
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked");
    }

    let metrics = client.pool.get_metrics();
    println!(
        "\n   {} requests over {} connections, {} hand-offs",
        metrics.total_acquired, metrics.total_created, metrics.handoffs
    );

    client.pool.shutdown();
    Ok(())
}
