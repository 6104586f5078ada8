use std::net::TcpListener;

/// Normalizes `host:port`, `http://host:port` or `https://host:port` into a
/// base URL without trailing slash
pub fn base_url(addr: &str) -> String {
    let normalized = addr
        .trim_start_matches("http://")
        .trim_start_matches("https://")
        .trim_end_matches('/');
    format!("http://{}", normalized)
}

/// Asks the OS for `count` currently free local ports
pub fn get_available_ports(count: usize) -> std::io::Result<Vec<u16>> {
    let mut listeners = Vec::with_capacity(count);
    for _ in 0..count {
        listeners.push(TcpListener::bind("127.0.0.1:0")?);
    }
    listeners
        .iter()
        .map(|l| l.local_addr().map(|a| a.port()))
        .collect()
}
