/// Static per-model properties, fixed at crate build time.
#[derive(Debug, serde::Serialize)]
pub struct Detector<Configuration> {
    pub name: &'static str,
    /// Unbinned sensor width in pixels.
    pub width: i64,
    /// Unbinned sensor height in pixels.
    pub height: i64,
    pub horiz_descramble_factor: i64,
    pub vert_descramble_factor: i64,
    pub num_taps: i64,
    pub pixel_clock_frequency: f64,
    /// Duration of one exposure/gap register step in seconds, derived from
    /// the pixel clock.
    pub exposure_and_gap_step_size: f64,
    /// `None` means the model has no streak-camera readout mode.
    pub maximum_streak_lines: Option<i64>,
    pub maximum_subimage_lines: i64,
    pub default_configuration: Configuration,
}

impl<Configuration> Detector<Configuration> {
    pub fn geometry(&self) -> aviex_types::DetectorGeometry {
        aviex_types::DetectorGeometry {
            framesize: (self.width, self.height),
            binsize: (1, 1),
            horiz_descramble_factor: self.horiz_descramble_factor,
            vert_descramble_factor: self.vert_descramble_factor,
            num_taps: self.num_taps,
        }
    }
}
