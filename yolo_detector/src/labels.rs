use crate::model_service::BoundingBox;
use std::{
    fs::File,
    io::{self, BufRead},
    path::Path,
};

#[derive(Debug, Clone, PartialEq)]
pub struct ColorLabel {
    pub label: String,
    pub red: u32,
    pub green: u32,
    pub blue: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBoxWithLabels {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub class_label: String,
    pub red: u32,
    pub green: u32,
    pub blue: u32,
    pub confidence: f32,
}

/// Loads `label,red,green,blue` lines. Blank lines are skipped.
pub fn load_labels(filepath: &Path) -> io::Result<Vec<ColorLabel>> {
    let file = File::open(filepath)?;
    parse_labels(io::BufReader::new(file))
}

fn parse_labels(reader: impl BufRead) -> io::Result<Vec<ColorLabel>> {
    let mut color_labels = Vec::new();

    for line_result in reader.lines() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').collect();

        if parts.len() != 4 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid line format: {}", line),
            ));
        }

        let channel = |value: &str, name: &str| -> io::Result<u32> {
            value.trim().parse().map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, format!("Invalid {} value", name))
            })
        };

        color_labels.push(ColorLabel {
            label: parts[0].trim().to_string(),
            red: channel(parts[1], "red")?,
            green: channel(parts[2], "green")?,
            blue: channel(parts[3], "blue")?,
        });
    }

    Ok(color_labels)
}

pub fn attach_labels(
    detections: Vec<BoundingBox>,
    class_labels: &[ColorLabel],
) -> Vec<BoundingBoxWithLabels> {
    detections
        .into_iter()
        .map(|bbox| match class_labels.get(bbox.class_id as usize) {
            Some(color_label) => BoundingBoxWithLabels {
                x1: bbox.x1,
                y1: bbox.y1,
                x2: bbox.x2,
                y2: bbox.y2,
                class_label: color_label.label.clone(),
                red: color_label.red,
                green: color_label.green,
                blue: color_label.blue,
                confidence: bbox.confidence,
            },
            None => BoundingBoxWithLabels {
                x1: bbox.x1,
                y1: bbox.y1,
                x2: bbox.x2,
                y2: bbox.y2,
                class_label: format!("Unknown class {}", bbox.class_id),
                red: 0,
                green: 0,
                blue: 0,
                confidence: bbox.confidence,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_labels() {
        let input = "person, 255, 0, 0\n\nbicycle,0,255,0\n";
        let labels = parse_labels(Cursor::new(input)).unwrap();

        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].label, "person");
        assert_eq!(labels[0].red, 255);
        assert_eq!(labels[1].label, "bicycle");
        assert_eq!(labels[1].green, 255);
    }

    #[test]
    fn test_parse_labels_rejects_bad_lines() {
        assert!(parse_labels(Cursor::new("person,255,0\n")).is_err());
        assert!(parse_labels(Cursor::new("person,red,0,0\n")).is_err());
    }

    #[test]
    fn test_load_labels_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "seal,10,20,30\n").unwrap();

        let labels = load_labels(&path).unwrap();
        assert_eq!(labels[0].blue, 30);
    }

    #[test]
    fn test_attach_labels_falls_back_for_unknown_class() {
        let labels = vec![ColorLabel {
            label: "person".to_string(),
            red: 255,
            green: 0,
            blue: 0,
        }];
        let detections = vec![
            BoundingBox {
                class_id: 0,
                confidence: 0.95,
                x1: 10.0,
                y1: 20.0,
                x2: 100.0,
                y2: 150.0,
            },
            BoundingBox {
                class_id: 42,
                confidence: 0.88,
                x1: 200.0,
                y1: 50.0,
                x2: 300.0,
                y2: 200.0,
            },
        ];

        let labelled = attach_labels(detections, &labels);

        assert_eq!(labelled[0].class_label, "person");
        assert_eq!(labelled[0].red, 255);
        assert_eq!(labelled[1].class_label, "Unknown class 42");
        assert_eq!((labelled[1].red, labelled[1].green, labelled[1].blue), (0, 0, 0));
    }
}
