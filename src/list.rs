// src/list.rs
use crate::error::Result;
use crate::format::{ImgMetadata, ImgfsHeader, Resolution};
use crate::imgfs::ImgFs;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// Human-readable dump of the header and every valid slot.
    Text,
    /// `{"Images":[...]}`, used by the HTTP front end.
    Json,
}

#[derive(Serialize)]
struct ImageList<'a> {
    #[serde(rename = "Images")]
    images: Vec<&'a str>,
}

impl ImgFs {
    /// Valid slots in ascending slot order.
    pub fn valid_entries(&self) -> impl Iterator<Item = &ImgMetadata> {
        self.metadata().iter().filter(|m| m.is_valid)
    }

    pub fn list(&self, mode: ListMode) -> Result<String> {
        match mode {
            ListMode::Text => {
                let mut out = self.header().to_string();
                if self.header().nb_files == 0 {
                    out.push_str("<< empty imgFS >>\n");
                } else {
                    for meta in self.valid_entries() {
                        out.push_str(&meta.to_string());
                    }
                }
                Ok(out)
            }
            ListMode::Json => {
                let list = ImageList {
                    images: self.valid_entries().map(|m| m.img_id.as_str()).collect(),
                };
                Ok(serde_json::to_string(&list)?)
            }
        }
    }
}

// --- Text rendering ---

const RULE: &str = "*****************************************";

impl fmt::Display for ImgfsHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [thumb, small] = self.resized_res;
        writeln!(f, "{}", RULE)?;
        writeln!(f, "********** IMGFS HEADER START ***********")?;
        writeln!(f, "TYPE: {}", self.name)?;
        writeln!(f, "VERSION: {}", self.version)?;
        writeln!(f, "IMAGE COUNT: {}\t\tMAX IMAGES: {}", self.nb_files, self.max_files)?;
        writeln!(
            f,
            "THUMBNAIL: {} x {}\tSMALL: {} x {}",
            thumb.width, thumb.height, small.width, small.height
        )?;
        writeln!(f, "*********** IMGFS HEADER END ************")?;
        writeln!(f, "{}", RULE)
    }
}

impl fmt::Display for ImgMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "IMAGE ID: {}", self.img_id)?;
        writeln!(f, "SHA: {}", hex::encode(self.sha))?;
        writeln!(f, "VALID: {}", u16::from(self.is_valid))?;
        writeln!(f, "UNUSED: 0")?;
        for (res, label) in [
            (Resolution::Orig, "ORIG. "),
            (Resolution::Thumb, "THUMB."),
            (Resolution::Small, "SMALL "),
        ] {
            let i = res.index();
            writeln!(
                f,
                "OFFSET {}: {}\t\tSIZE {}: {}",
                label, self.offset[i], label, self.size[i]
            )?;
        }
        writeln!(f, "ORIGINAL: {} x {}", self.orig_res[0], self.orig_res[1])?;
        writeln!(f, "{}", RULE)
    }
}
