use anyhow::Result;
use tracing::Level;
use tracing_subscriber::fmt;

/// Maps the number of `--verbose` flags to a log level; zero keeps logging off.
pub fn level_for(verbosity: u8) -> Option<Level> {
    match verbosity {
        0 => None,
        1 => Some(Level::INFO),
        2 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

/// Installs the stderr subscriber. Stdout is reserved for the extracted fields.
pub fn init(verbosity: u8) -> Result<()> {
    let Some(level) = level_for(verbosity) else {
        return Ok(());
    };
    let _ = fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_for(0), None);
        assert_eq!(level_for(1), Some(Level::INFO));
        assert_eq!(level_for(2), Some(Level::DEBUG));
        assert_eq!(level_for(7), Some(Level::TRACE));
    }
}
