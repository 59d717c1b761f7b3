use indicatif::{ProgressBar, ProgressStyle};

pub struct Progress {
    pb: ProgressBar,
}

impl Progress {
    pub fn new(len: usize, enabled: bool) -> Self {
        let pb = if enabled {
            let pb = ProgressBar::new(len as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
                    .progress_chars("##-"),
            );
            pb
        } else {
            ProgressBar::hidden()
        };

        Self { pb }
    }

    /// Marks one sample as done, `name` is shown next to the bar
    pub fn sample_done(&self, name: &str) {
        self.pb.set_message(name);
        self.pb.inc(1);
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.pb.finish_with_message("done");
    }
}
