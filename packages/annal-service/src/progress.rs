/// Receives coarse progress of a search. `fraction` runs from 0.0 to 1.0.
pub trait SearchProgress
where
	Self: Send + Sync,
{
	fn report(&self, fraction: f32, message: &str);
}

pub struct NoProgress;
impl SearchProgress for NoProgress {
	fn report(&self, _fraction: f32, _message: &str) {}
}
