//! Rotating-vector-model fit command builder.
use anyhow::{bail, Result};
use std::path::Path;

use super::archive_with_suffix;

/// Grid-search RVM fit over an RM-corrected archive.
///
/// The fit report and the chi-square map land at fixed filenames so the next
/// invocation (and the terminal stage) can find them without bookkeeping.
#[derive(Debug, Clone)]
pub struct RvmFitCommands<'a> {
    pub archive: &'a str,
    pub pointing_dir: &'a Path,
    pub obsid: &'a str,
    pub pulsar: &'a str,
    /// Grid points per axis of the alpha/zeta search.
    pub resolution: u32,
}

impl RvmFitCommands<'_> {
    pub fn append_to(&self, commands: &mut Vec<String>) -> Result<()> {
        if self.resolution == 0 {
            bail!("RVM search resolution must be positive");
        }
        let dir = self.pointing_dir.display();
        let corrected = archive_with_suffix(self.archive, ".ar2");
        let stem = archive_with_suffix(self.archive, "");
        let report = format!("{}_{}_RVM_fit.txt", self.obsid, self.pulsar);
        commands.push(format!("ppol -ext paswing {dir}/{corrected}"));
        commands.push(format!(
            "ppolFit -g \"{res} {res}\" -best -map {dir}/chi_map.txt {dir}/{stem}.paswing > {dir}/{report}",
            res = self.resolution
        ));
        Ok(())
    }
}
