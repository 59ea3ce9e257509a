/// Uses an associated type so each implementation picks its own time
/// representation. Both clocks in this crate use `chrono::DateTime<Utc>`.
pub trait GetNow {
    type Instant: Copy;

    fn now(&self) -> Self::Instant;
}
