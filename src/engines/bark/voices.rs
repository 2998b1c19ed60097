use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::model::BarkError;

/// An integer array decoded from a `.npy` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptArray {
    pub shape: Vec<usize>,
    pub data: Vec<i64>,
}

/// Speaker history prompts that fix a voice across every generated sentence.
///
/// The semantic prompt is 1-D; coarse and fine prompts are 2-D
/// (codebooks × frames).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoicePreset {
    pub semantic: PromptArray,
    pub coarse: PromptArray,
    pub fine: PromptArray,
}

impl VoicePreset {
    /// Assemble a preset, checking each prompt has the expected rank.
    pub fn new(
        semantic: PromptArray,
        coarse: PromptArray,
        fine: PromptArray,
    ) -> Result<Self, BarkError> {
        for (kind, prompt, ndim) in [
            ("semantic_prompt", &semantic, 1),
            ("coarse_prompt", &coarse, 2),
            ("fine_prompt", &fine, 2),
        ] {
            if prompt.shape.len() != ndim {
                return Err(BarkError::VoiceParse(format!(
                    "{kind} must be {ndim}-D, got shape {:?}",
                    prompt.shape
                )));
            }
        }
        Ok(Self {
            semantic,
            coarse,
            fine,
        })
    }

    /// Load a preset from three separate `.npy` files.
    pub fn load_npy_files(semantic: &Path, coarse: &Path, fine: &Path) -> Result<Self, BarkError> {
        let read = |path: &Path| -> Result<PromptArray, BarkError> {
            let data = std::fs::read(path)?;
            parse_npy(&data, &path.display().to_string())
        };
        Self::new(read(semantic)?, read(coarse)?, read(fine)?)
    }

    /// Load a preset from a `.npz` archive holding `semantic_prompt`,
    /// `coarse_prompt` and `fine_prompt` entries.
    pub fn load_npz(path: &Path) -> Result<Self, BarkError> {
        let file = File::open(path)?;
        let mut zip = zip::ZipArchive::new(file)
            .map_err(|e| BarkError::VoiceParse(format!("Failed to open zip archive: {e}")))?;

        let mut read_entry = |kind: &str| -> Result<PromptArray, BarkError> {
            let name = format!("{kind}.npy");
            let mut entry = zip.by_name(&name).map_err(|e| {
                BarkError::VoiceParse(format!("{}: missing {name}: {e}", path.display()))
            })?;
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| BarkError::VoiceParse(format!("Failed to read {name}: {e}")))?;
            parse_npy(&data, &name)
        };

        let semantic = read_entry("semantic_prompt")?;
        let coarse = read_entry("coarse_prompt")?;
        let fine = read_entry("fine_prompt")?;
        log::info!("Loaded voice preset from {}", path.display());
        Self::new(semantic, coarse, fine)
    }
}

/// Parse a numpy .npy file holding an integer array.
///
/// Supports format versions 1–3, little-endian `i8`/`i4`/`i2`, `u2` and
/// single-byte `u1`, in C order.
pub fn parse_npy(data: &[u8], name: &str) -> Result<PromptArray, BarkError> {
    if data.len() < 10 {
        return Err(BarkError::VoiceParse(format!(
            "{name}: file too short ({} bytes)",
            data.len()
        )));
    }

    if &data[0..6] != b"\x93NUMPY" {
        return Err(BarkError::VoiceParse(format!(
            "{name}: invalid numpy magic bytes"
        )));
    }

    // v1 stores the header length as u16, v2/v3 as u32 (both little-endian)
    let (header_len, header_start) = match data[6] {
        1 => (u16::from_le_bytes([data[8], data[9]]) as usize, 10),
        2 | 3 if data.len() >= 12 => (
            u32::from_le_bytes([data[8], data[9], data[10], data[11]]) as usize,
            12,
        ),
        major => {
            return Err(BarkError::VoiceParse(format!(
                "{name}: unsupported npy version {major}"
            )))
        }
    };
    let data_offset = header_start + header_len;

    if data.len() < data_offset {
        return Err(BarkError::VoiceParse(format!(
            "{name}: header truncated (need {data_offset} bytes, got {})",
            data.len()
        )));
    }

    let header = std::str::from_utf8(&data[header_start..data_offset])
        .map_err(|_| BarkError::VoiceParse(format!("{name}: header is not valid UTF-8")))?;
    let (descr, fortran_order, shape) = parse_header(header)
        .ok_or_else(|| BarkError::VoiceParse(format!("{name}: malformed header {header:?}")))?;

    if fortran_order {
        return Err(BarkError::VoiceParse(format!(
            "{name}: Fortran-ordered arrays are not supported"
        )));
    }

    let width = match descr {
        "<i8" => 8,
        "<i4" => 4,
        "<i2" | "<u2" => 2,
        "|u1" | "<u1" => 1,
        other => {
            return Err(BarkError::VoiceParse(format!(
                "{name}: unsupported dtype {other}"
            )))
        }
    };

    let count: usize = shape.iter().product();
    let payload = &data[data_offset..];
    if payload.len() < count * width {
        return Err(BarkError::VoiceParse(format!(
            "{name}: expected {} data bytes, got {}",
            count * width,
            payload.len()
        )));
    }

    let values = payload[..count * width].chunks_exact(width);
    let data = match descr {
        "<i8" => values
            .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect(),
        "<i4" => values
            .map(|b| i64::from(i32::from_le_bytes([b[0], b[1], b[2], b[3]])))
            .collect(),
        "<i2" => values
            .map(|b| i64::from(i16::from_le_bytes([b[0], b[1]])))
            .collect(),
        "<u2" => values
            .map(|b| i64::from(u16::from_le_bytes([b[0], b[1]])))
            .collect(),
        _ => values.map(|b| i64::from(b[0])).collect(),
    };

    Ok(PromptArray { shape, data })
}

/// Extract `descr`, `fortran_order` and `shape` from a header dict such as
/// `{'descr': '<i8', 'fortran_order': False, 'shape': (2, 5), }`.
fn parse_header(header: &str) -> Option<(&str, bool, Vec<usize>)> {
    let descr = header_value(header, "descr")?
        .strip_prefix('\'')?
        .split('\'')
        .next()?;

    let fortran_order = header_value(header, "fortran_order")?.starts_with("True");

    let shape_src = header_value(header, "shape")?.strip_prefix('(')?;
    let shape_src = &shape_src[..shape_src.find(')')?];
    let shape = shape_src
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| dim.parse::<usize>().ok())
        .collect::<Option<Vec<_>>>()?;

    Some((descr, fortran_order, shape))
}

fn header_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let pattern = format!("'{key}':");
    let start = header.find(&pattern)? + pattern.len();
    Some(header[start..].trim_start())
}

#[cfg(test)]
mod tests {
    use super::{parse_npy, PromptArray, VoicePreset};
    use crate::engines::bark::model::BarkError;
    use std::io::Write;

    fn npy(descr: &str, shape: &str, payload: &[u8]) -> Vec<u8> {
        let header = format!("{{'descr': '{descr}', 'fortran_order': False, 'shape': {shape}, }}\n");
        let mut out = b"\x93NUMPY\x01\x00".to_vec();
        out.extend_from_slice(&(header.len() as u16).to_le_bytes());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn i64_bytes(values: &[i64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn parses_int64_vector() {
        let data = npy("<i8", "(3,)", &i64_bytes(&[7, -1, 10_000]));
        let array = parse_npy(&data, "semantic").expect("parse");
        assert_eq!(array.shape, vec![3]);
        assert_eq!(array.data, vec![7, -1, 10_000]);
    }

    #[test]
    fn widens_int32_matrix() {
        let payload: Vec<u8> = [1i32, 2, 3, 4, 5, 6]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let array = parse_npy(&npy("<i4", "(2, 3)", &payload), "coarse").expect("parse");
        assert_eq!(array.shape, vec![2, 3]);
        assert_eq!(array.data, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn parses_version_two_header() {
        let header = "{'descr': '|u1', 'fortran_order': False, 'shape': (2,), }\n";
        let mut data = b"\x93NUMPY\x02\x00".to_vec();
        data.extend_from_slice(&(header.len() as u32).to_le_bytes());
        data.extend_from_slice(header.as_bytes());
        data.extend_from_slice(&[200, 3]);

        let array = parse_npy(&data, "v2").expect("parse");
        assert_eq!(array.data, vec![200, 3]);
    }

    #[test]
    fn rejects_bad_magic_and_truncated_payload() {
        let mut data = npy("<i8", "(2,)", &i64_bytes(&[1, 2]));
        data[1] = b'X';
        assert!(matches!(parse_npy(&data, "x"), Err(BarkError::VoiceParse(_))));

        let data = npy("<i8", "(4,)", &i64_bytes(&[1, 2]));
        let err = parse_npy(&data, "short").unwrap_err();
        assert!(err.to_string().contains("expected 32 data bytes"));
    }

    #[test]
    fn rejects_float_and_fortran_arrays() {
        let data = npy("<f4", "(1,)", &1.0f32.to_le_bytes());
        assert!(parse_npy(&data, "f").unwrap_err().to_string().contains("dtype"));

        let header = "{'descr': '<i8', 'fortran_order': True, 'shape': (1,), }\n";
        let mut data = b"\x93NUMPY\x01\x00".to_vec();
        data.extend_from_slice(&(header.len() as u16).to_le_bytes());
        data.extend_from_slice(header.as_bytes());
        data.extend_from_slice(&i64_bytes(&[1]));
        assert!(parse_npy(&data, "f").unwrap_err().to_string().contains("Fortran"));
    }

    #[test]
    fn preset_rank_is_validated() {
        let vector = PromptArray {
            shape: vec![2],
            data: vec![1, 2],
        };
        let matrix = PromptArray {
            shape: vec![1, 2],
            data: vec![1, 2],
        };
        assert!(VoicePreset::new(vector.clone(), matrix.clone(), matrix.clone()).is_ok());
        let err = VoicePreset::new(matrix.clone(), matrix.clone(), matrix).unwrap_err();
        assert!(err.to_string().contains("semantic_prompt must be 1-D"));
    }

    #[test]
    fn loads_npz_archive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("speaker.npz");
        let file = std::fs::File::create(&path).expect("create");
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, shape, values) in [
            ("semantic_prompt.npy", "(3,)", vec![1, 2, 3]),
            ("coarse_prompt.npy", "(2, 2)", vec![4, 5, 6, 7]),
            ("fine_prompt.npy", "(2, 1)", vec![8, 9]),
        ] {
            zip.start_file(name, options).expect("start");
            zip.write_all(&npy("<i8", shape, &i64_bytes(&values)))
                .expect("write");
        }
        zip.finish().expect("finish");

        let preset = VoicePreset::load_npz(&path).expect("load");
        assert_eq!(preset.semantic.data, vec![1, 2, 3]);
        assert_eq!(preset.coarse.shape, vec![2, 2]);
        assert_eq!(preset.fine.data, vec![8, 9]);
    }

    #[test]
    fn npz_without_fine_prompt_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("partial.npz");
        let file = std::fs::File::create(&path).expect("create");
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        zip.start_file("semantic_prompt.npy", options).expect("start");
        zip.write_all(&npy("<i8", "(1,)", &i64_bytes(&[1])))
            .expect("write");
        zip.start_file("coarse_prompt.npy", options).expect("start");
        zip.write_all(&npy("<i8", "(1, 1)", &i64_bytes(&[1])))
            .expect("write");
        zip.finish().expect("finish");

        let err = VoicePreset::load_npz(&path).unwrap_err();
        assert!(err.to_string().contains("fine_prompt.npy"));
    }
}
