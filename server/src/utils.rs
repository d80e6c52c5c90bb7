use rand::Rng;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Get current timestamp in milliseconds
pub fn get_timestamp() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis();
    millis.min(u64::MAX as u128) as u64
}

// Random saturated colour for food pellets
pub fn random_food_color<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("hsl({},70%,50%)", rng.gen_range(0..360))
}

// Trim and cut client supplied text to at most `max_chars` characters
pub fn clip_text(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_timestamp_is_monotonic_enough() {
        let t1 = get_timestamp();
        std::thread::sleep(Duration::from_millis(2));
        let t2 = get_timestamp();
        assert!(t2 > t1);
    }

    #[test]
    fn test_food_color_format() {
        let mut rng = StdRng::seed_from_u64(3);
        let color = random_food_color(&mut rng);
        assert!(color.starts_with("hsl("));
        assert!(color.ends_with(",70%,50%)"));
    }

    #[test]
    fn test_clip_text() {
        assert_eq!(clip_text("  hello  ", 10), "hello");
        assert_eq!(clip_text("abcdef", 3), "abc");
        // counts characters, not bytes
        assert_eq!(clip_text("ñandú", 4), "ñand");
    }
}
