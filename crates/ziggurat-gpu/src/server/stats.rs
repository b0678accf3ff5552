/// Frame-lifetime counters owned by the [`Server`](super::Server).
///
/// Plain integers, no atomics: the server is render-thread affine, so
/// these are only touched from one thread. Callers snapshot or reset
/// between frames as they see fit.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    num_textures_created: u32,
    num_texture_uploads: u32,
    num_render_passes: u32,
    num_draws: u32,
    num_failed_draws: u32,
    num_submits: u32,
    num_scratch_textures_reused: u32,
    num_msaa_attachments_reused: u32,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn num_textures_created(&self) -> u32 {
        self.num_textures_created
    }

    #[inline]
    pub fn num_texture_uploads(&self) -> u32 {
        self.num_texture_uploads
    }

    /// Render passes *attempted*, counted before the backend gets a say.
    #[inline]
    pub fn num_render_passes(&self) -> u32 {
        self.num_render_passes
    }

    #[inline]
    pub fn num_draws(&self) -> u32 {
        self.num_draws
    }

    /// Draws dropped because their pipeline failed to bind.
    #[inline]
    pub fn num_failed_draws(&self) -> u32 {
        self.num_failed_draws
    }

    #[inline]
    pub fn num_submits(&self) -> u32 {
        self.num_submits
    }

    #[inline]
    pub fn num_scratch_textures_reused(&self) -> u32 {
        self.num_scratch_textures_reused
    }

    #[inline]
    pub fn num_msaa_attachments_reused(&self) -> u32 {
        self.num_msaa_attachments_reused
    }

    pub(crate) fn inc_textures_created(&mut self) {
        self.num_textures_created += 1;
    }

    pub(crate) fn inc_texture_uploads(&mut self) {
        self.num_texture_uploads += 1;
    }

    pub(crate) fn inc_render_passes(&mut self) {
        self.num_render_passes += 1;
    }

    pub(crate) fn add_draws(&mut self, draws: u32, failed: u32) {
        self.num_draws += draws;
        self.num_failed_draws += failed;
    }

    pub(crate) fn inc_submits(&mut self) {
        self.num_submits += 1;
    }

    pub(crate) fn inc_scratch_textures_reused(&mut self) {
        self.num_scratch_textures_reused += 1;
    }

    pub(crate) fn inc_msaa_attachments_reused(&mut self) {
        self.num_msaa_attachments_reused += 1;
    }
}

impl std::fmt::Display for Stats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "textures {} (+{} uploads, {} scratch reused, {} msaa reused), \
             passes {}, draws {} ({} failed), submits {}",
            self.num_textures_created,
            self.num_texture_uploads,
            self.num_scratch_textures_reused,
            self.num_msaa_attachments_reused,
            self.num_render_passes,
            self.num_draws,
            self.num_failed_draws,
            self.num_submits,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_every_counter() {
        let mut stats = Stats::new();
        stats.inc_textures_created();
        stats.inc_render_passes();
        stats.add_draws(3, 1);
        stats.inc_submits();
        stats.reset();
        assert_eq!(stats, Stats::default());
    }
}
