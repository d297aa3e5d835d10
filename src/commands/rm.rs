//! Rotation-measure command builders: fit, synthesis, and correction.
use anyhow::{bail, Result};
use std::path::Path;

use super::archive_with_suffix;

/// `rmfit` over a folded archive, report redirected to a deterministic
/// filename.
#[derive(Debug, Clone)]
pub struct RmFitCommands<'a> {
    pub archive: &'a str,
    pub pointing_dir: &'a Path,
    pub obsid: &'a str,
    pub pulsar: &'a str,
    pub out_name: Option<&'a str>,
}

impl RmFitCommands<'_> {
    pub fn append_to(&self, commands: &mut Vec<String>) -> Result<()> {
        let dir = self.pointing_dir.display();
        let archive = archive_with_suffix(self.archive, ".ar");
        let out = match self.out_name {
            Some(name) => name.to_string(),
            None => format!("{}_{}_rmfit.txt", self.obsid, self.pulsar),
        };
        commands.push(format!(
            "echo 'Attempting to find the rotation measure, writing to {dir}/{out}'"
        ));
        commands.push(format!("rmfit {dir}/{archive} -t > {dir}/{out}"));
        Ok(())
    }
}

/// RM synthesis over a folded archive. Output, diagnostic plot, and the
/// intermediate flux file are independently toggleable; single-pointing mode
/// is always forced.
#[derive(Debug, Clone)]
pub struct RmSynthesisCommands<'a> {
    pub archive: &'a str,
    pub pointing_dir: &'a Path,
    pub obsid: &'a str,
    pub pulsar: &'a str,
    pub write_output: bool,
    pub plot: bool,
    pub keep_flux: bool,
    pub out_name: Option<&'a str>,
}

impl RmSynthesisCommands<'_> {
    pub fn append_to(&self, commands: &mut Vec<String>) -> Result<()> {
        let dir = self.pointing_dir.display();
        let archive = archive_with_suffix(self.archive, ".ar");
        let mut command = format!("rm_synthesis {dir}/{archive} --force_single");
        if self.write_output {
            let out = match self.out_name {
                Some(name) => name.to_string(),
                None => format!("{}_{}_RM_synthesis.txt", self.obsid, self.pulsar),
            };
            command.push_str(&format!(" --write {dir}/{out}"));
        }
        if self.plot {
            command.push_str(" --plot");
        }
        if self.keep_flux {
            command.push_str(" --keep_flux");
        }
        commands.push(command);
        Ok(())
    }
}

/// Faraday-rotation correction plus ascii export of the corrected archive.
#[derive(Debug, Clone)]
pub struct RmCorrectionCommands<'a> {
    pub archive: &'a str,
    pub pointing_dir: &'a Path,
    /// The RM to correct with. Required; there is no sensible default.
    pub rm: Option<f64>,
    pub ascii_out: Option<&'a str>,
}

impl RmCorrectionCommands<'_> {
    pub fn append_to(&self, commands: &mut Vec<String>) -> Result<()> {
        let Some(rm) = self.rm else {
            bail!("rotation measure undefined, cannot build correction commands");
        };
        let dir = self.pointing_dir.display();
        let archive = archive_with_suffix(self.archive, ".ar");
        let corrected = archive_with_suffix(self.archive, ".ar2");
        let ascii = match self.ascii_out {
            Some(name) => name.to_string(),
            None => format!("{}.txt", archive_with_suffix(self.archive, "")),
        };
        commands.push(format!("echo 'Correcting for rotation measure {rm}'"));
        commands.push(format!("pam -e ar2 -R {rm} {dir}/{archive}"));
        commands.push(format!("pdv -FTt {dir}/{corrected} > {dir}/{ascii}"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn rmfit_report_name_derives_from_target() {
        let dir = PathBuf::from("/tmp/p");
        let mut commands = Vec::new();
        RmFitCommands {
            archive: "1255444104_J2241-5236_archive",
            pointing_dir: &dir,
            obsid: "1255444104",
            pulsar: "J2241-5236",
            out_name: None,
        }
        .append_to(&mut commands)
        .unwrap();
        assert_eq!(
            commands.last().unwrap(),
            "rmfit /tmp/p/1255444104_J2241-5236_archive.ar -t > /tmp/p/1255444104_J2241-5236_rmfit.txt"
        );
    }

    #[test]
    fn synthesis_toggles_are_independent() {
        let dir = PathBuf::from("/tmp/p");
        let mut commands = Vec::new();
        RmSynthesisCommands {
            archive: "1255444104_J2241-5236_archive.ar",
            pointing_dir: &dir,
            obsid: "1255444104",
            pulsar: "J2241-5236",
            write_output: true,
            plot: true,
            keep_flux: false,
            out_name: None,
        }
        .append_to(&mut commands)
        .unwrap();
        let command = commands.last().unwrap();
        assert!(command.contains("--force_single"));
        assert!(command.contains("--write /tmp/p/1255444104_J2241-5236_RM_synthesis.txt"));
        assert!(command.contains("--plot"));
        assert!(!command.contains("--keep_flux"));
    }

    #[test]
    fn correction_chains_pam_then_ascii_export() {
        let dir = PathBuf::from("/tmp/p");
        let mut commands = Vec::new();
        RmCorrectionCommands {
            archive: "1255444104_J2241-5236_archive.ar",
            pointing_dir: &dir,
            rm: Some(40.0),
            ascii_out: None,
        }
        .append_to(&mut commands)
        .unwrap();
        assert_eq!(
            commands[1],
            "pam -e ar2 -R 40 /tmp/p/1255444104_J2241-5236_archive.ar"
        );
        assert_eq!(
            commands[2],
            "pdv -FTt /tmp/p/1255444104_J2241-5236_archive.ar2 > /tmp/p/1255444104_J2241-5236_archive.txt"
        );
    }

    #[test]
    fn ipfb_ascii_export_keeps_the_ipfb_stem() {
        let dir = PathBuf::from("/tmp/p");
        let mut commands = Vec::new();
        RmCorrectionCommands {
            archive: "1255444104_J2241-5236_ipfb_archive.ar",
            pointing_dir: &dir,
            rm: Some(-12.5),
            ascii_out: None,
        }
        .append_to(&mut commands)
        .unwrap();
        assert!(commands[2].ends_with("1255444104_J2241-5236_ipfb_archive.txt"));
    }

    #[test]
    fn correction_without_rm_appends_nothing() {
        let dir = PathBuf::from("/tmp/p");
        let mut commands = vec!["echo existing".to_string()];
        let result = RmCorrectionCommands {
            archive: "x_archive.ar",
            pointing_dir: &dir,
            rm: None,
            ascii_out: None,
        }
        .append_to(&mut commands);
        assert!(result.is_err());
        assert_eq!(commands.len(), 1);
    }
}
