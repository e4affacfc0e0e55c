//! CSV sinks for segments, envelope points, and spectral points.
//!
//! Same discipline as every CSV this tool's lineage writes: open in
//! append mode, write the header only when the file is empty, flush when
//! the pass completes.

use std::fs::{ File, OpenOptions };
use std::io::Write;
use std::path::Path;

use crate::error::CarveResult;
use crate::mods::frame_math::invariant_time_text;
use crate::mods::segments::AudioSegment;
use crate::mods::types::{ PeakPoint, SpectralPoint };

fn open_with_header(path: &Path, header: &str) -> CarveResult<File> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if file.metadata()?.len() == 0 {
        writeln!(file, "{}", header)?;
        file.flush()?;
    }
    Ok(file)
}

/// Append one stream's planned segments, with both frame positions and
/// invariant second texts for human eyes.
pub fn append_segments_csv(
    path: &Path,
    label: &str,
    sample_rate: u32,
    segments: &[AudioSegment]
) -> CarveResult<()> {
    let mut file = open_with_header(path, "label,start_frame,end_frame,start_s,end_s")?;
    for seg in segments {
        writeln!(
            file,
            "{},{},{},{},{}",
            label,
            seg.start_frame,
            seg.end_frame,
            invariant_time_text(seg.start_frame, sample_rate),
            invariant_time_text(seg.end_frame, sample_rate)
        )?;
    }
    file.flush()?;
    Ok(())
}

/// Streaming sink for peak-envelope points.
pub struct EnvelopeCsvSink {
    file: File,
    written: u64,
}

impl EnvelopeCsvSink {
    pub fn open(path: &Path) -> CarveResult<Self> {
        let file = open_with_header(path, "label,window_ms,anchor_ms,peak_db")?;
        Ok(EnvelopeCsvSink { file, written: 0 })
    }

    pub fn write(&mut self, point: &PeakPoint) -> CarveResult<()> {
        writeln!(
            self.file,
            "{},{},{},{:.2}",
            point.label,
            point.window_ms,
            point.anchor_ms,
            point.value_db
        )?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> CarveResult<()> {
        self.file.flush()?;
        Ok(())
    }
}

/// Streaming sink for spectral points. Bins stay ordered and are joined
/// with `;` inside one CSV field.
pub struct SpectralCsvSink {
    file: File,
    written: u64,
}

impl SpectralCsvSink {
    pub fn open(path: &Path) -> CarveResult<Self> {
        let file = open_with_header(path, "label,channel,window_samples,anchor_ms,bins_db")?;
        Ok(SpectralCsvSink { file, written: 0 })
    }

    pub fn write(&mut self, point: &SpectralPoint) -> CarveResult<()> {
        let bins = point.bins_db
            .iter()
            .map(|b| format!("{:.2}", b))
            .collect::<Vec<_>>()
            .join(";");
        writeln!(
            self.file,
            "{},{},{},{},{}",
            point.label,
            point.channel,
            point.window_samples,
            point.anchor_ms,
            bins
        )?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> CarveResult<()> {
        self.file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("silence-carver-test-{}-{}", std::process::id(), name));
        let _ = std::fs::remove_file(&p);
        p
    }

    #[test]
    fn segments_csv_has_header_and_time_texts() {
        let path = temp_path("segments.csv");
        let segs = vec![
            AudioSegment { start_frame: 0, end_frame: 22050 },
            AudioSegment { start_frame: 44100, end_frame: 88200 },
        ];
        append_segments_csv(&path, "track", 44100, &segs).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "label,start_frame,end_frame,start_s,end_s");
        assert_eq!(lines[1], "track,0,22050,0,0.5");
        assert_eq!(lines[2], "track,44100,88200,1,2");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn header_is_written_only_once_across_appends() {
        let path = temp_path("append.csv");
        let seg = vec![AudioSegment { start_frame: 0, end_frame: 10 }];
        append_segments_csv(&path, "a", 1000, &seg).unwrap();
        append_segments_csv(&path, "b", 1000, &seg).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().filter(|l| l.starts_with("label,")).count(), 1);
        assert_eq!(text.lines().count(), 3);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn point_sinks_count_and_format_rows() {
        let path = temp_path("points.csv");
        let mut sink = EnvelopeCsvSink::open(&path).unwrap();
        sink.write(&PeakPoint {
            label: "x".to_string(),
            window_ms: 300,
            anchor_ms: 100,
            value_db: -12.351,
        }).unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.written(), 1);
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.lines().any(|l| l == "x,300,100,-12.35"));
        let _ = std::fs::remove_file(&path);

        let path = temp_path("spectral.csv");
        let mut sink = SpectralCsvSink::open(&path).unwrap();
        sink.write(&SpectralPoint {
            label: "x".to_string(),
            channel: 1,
            window_samples: 1024,
            anchor_ms: 250,
            bins_db: vec![-3.0, -60.126],
        }).unwrap();
        sink.flush().unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.lines().any(|l| l == "x,1,1024,250,-3.00;-60.13"));
        let _ = std::fs::remove_file(&path);
    }
}
