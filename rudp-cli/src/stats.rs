//! Statistics display and formatting

use rudp::protocol::RttStats;
use rudp::{ReceiverStats, SenderReport};
use std::time::Duration;

/// Format RTT in human-readable form
pub fn format_rtt(rtt: Duration) -> String {
    let rtt_us = rtt.as_micros();
    if rtt_us >= 1_000_000 {
        format!("{:.2}s", rtt_us as f64 / 1_000_000.0)
    } else if rtt_us >= 1_000 {
        format!("{:.2}ms", rtt_us as f64 / 1_000.0)
    } else {
        format!("{}µs", rtt_us)
    }
}

/// Format duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Format an optional percentage
pub fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(rate) => format!("{:.1}%", rate),
        None => "N/A".to_string(),
    }
}

/// Smoothed RTT with its variance, e.g. `12.00ms ± 3.00ms`
pub fn format_smoothed_rtt(rtt: &RttStats) -> Option<String> {
    let smoothed = rtt.smoothed()?;
    let variance = rtt.variance()?;
    Some(format!("{} ± {}", format_rtt(smoothed), format_rtt(variance)))
}

/// Display the final sender statistics
pub fn display_sender_stats(report: &SenderReport) {
    let stats = &report.stats;
    let average_rtt = stats
        .average_rtt()
        .map(format_rtt)
        .unwrap_or_else(|| "N/A".to_string());

    println!("\n┌─────────────────────────────────────────────────────────────┐");
    println!("│ SENDER STATISTICS                                           │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ Messages sent:      {:<40}│", stats.messages_sent);
    println!("│ Messages acked:     {:<40}│", stats.messages_acked);
    println!("│ Success rate:       {:<40}│", format_rate(stats.success_rate()));
    println!("│ Bundles sent:       {:<40}│", stats.bundles_sent);
    println!("│ Retransmissions:    {:<40}│", stats.retransmissions);
    println!("│ Dropped:            {:<40}│", stats.messages_dropped);
    println!("│ Average RTT:        {:<40}│", average_rtt);
    if let (Some(min), Some(max)) = (stats.rtt.min(), stats.rtt.max()) {
        let range = format!("{} / {}", format_rtt(min), format_rtt(max));
        println!("│ Min / max RTT:      {:<40}│", range);
    }
    if let Some(smoothed) = format_smoothed_rtt(&stats.rtt) {
        println!("│ Smoothed RTT:       {:<40}│", smoothed);
    }
    println!("└─────────────────────────────────────────────────────────────┘");

    if !report.still_pending.is_empty() {
        let seqs: Vec<String> = report.still_pending.iter().map(|s| s.to_string()).collect();
        println!("Still pending: {}", seqs.join(", "));
    }
}

/// Display receiver statistics
pub fn display_receiver_stats(stats: &ReceiverStats, uptime: Duration) {
    println!("\n┌─────────────────────────────────────────────────────────────┐");
    println!("│ RECEIVER STATISTICS                                         │");
    println!("├─────────────────────────────────────────────────────────────┤");
    println!("│ Uptime:             {:<40}│", format_duration(uptime));
    println!("│ Total packets:      {:<40}│", stats.total_packets);
    println!("│ Bundles received:   {:<40}│", stats.bundles_received);
    println!("│ Retransmissions:    {:<40}│", stats.singles_received);
    println!("│ Processed:          {:<40}│", stats.messages_processed);
    println!("│ Buffered:           {:<40}│", stats.messages_buffered);
    println!("│ Acks sent:          {:<40}│", stats.acks_sent);
    println!("│ Simulated loss:     {:<40}│", stats.packets_lost);
    println!("│ Duplicates:         {:<40}│", stats.duplicates_dropped);
    println!("│ Out of window:      {:<40}│", stats.out_of_window);
    println!("│ Malformed:          {:<40}│", stats.malformed_packets);
    println!("│ Active clients:     {:<40}│", stats.active_clients);
    println!("└─────────────────────────────────────────────────────────────┘");
}
