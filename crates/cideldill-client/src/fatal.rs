/// Print a remediation report and terminate the process.
///
/// A debug-ON debuggee that cannot reach the server would silently miss
/// breakpoints; that is treated as a safety bug, not a recoverable error
/// (spec §4.D, §9 "Fatal-exit on transport failure").
pub fn exit_with_server_failure(summary: &str, server_url: &str, error: Option<&dyn std::error::Error>) -> ! {
    tracing::error!(summary, server_url, error = error.map(|e| e.to_string()), "fatal: breakpoint server unreachable");

    let mut lines = vec![
        "cideldill: failed to contact the breakpoint server.".to_string(),
        String::new(),
        "Details:".to_string(),
        format!("- Summary: {summary}"),
        format!("- Server URL: {server_url}"),
    ];
    if let Some(error) = error {
        lines.push(format!("- Error: {error}"));
    }
    lines.extend([
        String::new(),
        "Most likely causes:".to_string(),
        "1. The breakpoint server is not running.".to_string(),
        "2. The server is running on a different port or URL.".to_string(),
        "3. The server is not reachable from this environment (container/remote).".to_string(),
        String::new(),
        "Potential fixes:".to_string(),
        "1. Start the breakpoint server and retry.".to_string(),
        "2. Set CIDELDILL_SERVER_URL to the correct URL.".to_string(),
        "3. Ensure the port is exposed and firewall rules allow access.".to_string(),
        String::new(),
        "Exiting now.".to_string(),
    ]);

    eprintln!("{}", lines.join("\n"));
    std::process::exit(1);
}
