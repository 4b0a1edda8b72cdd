#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Zip,
    TarGz,
}

impl ArchiveType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::TarGz => "tar.gz",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "zip" => Some(Self::Zip),
            "tar.gz" | "tgz" | "gz" => Some(Self::TarGz),
            _ => None,
        }
    }

    pub fn infer_from_file_name(file_name: &str) -> Option<Self> {
        let lower = file_name.trim().to_ascii_lowercase();
        if lower.ends_with(".zip") {
            return Some(Self::Zip);
        }
        if lower.ends_with(".gz") || lower.ends_with(".tgz") {
            return Some(Self::TarGz);
        }
        None
    }
}
