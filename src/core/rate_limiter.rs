use std::time::Duration;
use tokio::time::sleep;
use rand::Rng;

pub struct RateLimiter;

impl RateLimiter {
    /// Pause before the next request to the same source.
    pub async fn wait(source: &str) {
        sleep(Self::delay_for(source)).await;
    }

    /// Fixed pause between pipeline phases.
    pub async fn phase_pause(pause: Duration) {
        if !pause.is_zero() {
            sleep(pause).await;
        }
    }

    fn delay_for(source: &str) -> Duration {
        match source.to_uppercase().as_str() {
            "FRED" => {
                // WAF avoidance with jitter
                Duration::from_millis(rand::thread_rng().gen_range(1500..3000))
            }
            "ARXIV" => {
                // arXiv asks for ~3s between API calls
                Duration::from_millis(rand::thread_rng().gen_range(3000..3500))
            }
            _ => Duration::from_millis(100),
        }
    }
}
