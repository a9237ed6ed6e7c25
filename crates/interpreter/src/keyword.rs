//! Rule-based interpreter
//!
//! Splits an instruction into clauses ("denoise it, then trim from 5 to 20s")
//! and matches each clause against keyword rules. Numbers near the keywords
//! become parameters. Clauses that match nothing are reported as
//! unrecognized rather than guessed at.

use async_trait::async_trait;
use tracing::debug;
use video_edit_common::AssetMetadata;
use video_edit_core::{InterpretError, Interpreter, RawCandidate};

/// Words that join two requests inside one sentence
const CONNECTIVES: &[&str] = &["and", "then", "also", "plus", "&", "afterwards", "finally"];

/// Aspect ratios recognised in "crop to 16:9"
const ASPECT_RATIOS: &[(u32, u32)] = &[(16, 9), (9, 16), (4, 3), (3, 4), (1, 1), (21, 9), (4, 5)];

const NEGATIONS: &[&str] = &["less", "reduce", "lower", "decrease", "soften", "tone"];

#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordInterpreter;

impl KeywordInterpreter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Interpret synchronously; never fails
    #[must_use]
    pub fn parse(&self, instruction: &str, metadata: Option<&AssetMetadata>) -> Vec<RawCandidate> {
        let mut candidates = Vec::new();
        for clause in split_clauses(instruction) {
            let mut matched = match_clause(&clause, metadata);
            if matched.is_empty() {
                debug!("No rule matched clause {:?}", clause.text);
                candidates.push(RawCandidate::unrecognized(clause.text));
                continue;
            }
            matched.sort_by_key(|(pos, _)| *pos);
            candidates.extend(matched.into_iter().map(|(_, c)| c));
        }
        candidates
    }
}

#[async_trait]
impl Interpreter for KeywordInterpreter {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn interpret(
        &self,
        instruction: &str,
        metadata: Option<&AssetMetadata>,
    ) -> Result<Vec<RawCandidate>, InterpretError> {
        Ok(self.parse(instruction, metadata))
    }
}

/// One request inside an instruction
#[derive(Debug, Clone)]
struct Clause {
    text: String,
    words: Vec<String>,
}

impl Clause {
    fn new(words: Vec<String>) -> Self {
        Self {
            text: words.join(" "),
            words,
        }
    }

    fn word(&self, pred: impl Fn(&str) -> bool) -> Option<usize> {
        self.words.iter().position(|w| pred(w))
    }

    fn prefixed(&self, prefixes: &[&str]) -> Option<usize> {
        self.word(|w| prefixes.iter().any(|p| w.starts_with(p)))
    }

    fn exact(&self, words: &[&str]) -> Option<usize> {
        self.word(|w| words.contains(&w))
    }

    /// Word index where a multi-word phrase starts
    fn phrase(&self, phrase: &str) -> Option<usize> {
        let parts: Vec<&str> = phrase.split_whitespace().collect();
        if parts.is_empty() || parts.len() > self.words.len() {
            return None;
        }
        (0..=self.words.len() - parts.len())
            .find(|&i| parts.iter().enumerate().all(|(j, p)| self.words[i + j] == *p))
    }

    /// Plain numbers and clock times, in seconds when a unit follows
    fn numbers(&self) -> Vec<(usize, f64)> {
        let mut out = Vec::new();
        for (i, word) in self.words.iter().enumerate() {
            let Some(mut value) = parse_time(word) else {
                continue;
            };
            if let Some(next) = self.words.get(i + 1) {
                if next.starts_with("min") {
                    value *= 60.0;
                } else if next.starts_with("hour") {
                    value *= 3600.0;
                }
            }
            out.push((i, value));
        }
        out
    }

    /// "2x", "x1.5", "double", "half"
    fn multiplier(&self) -> Option<f64> {
        for word in &self.words {
            let factor = word
                .strip_suffix('x')
                .or_else(|| word.strip_prefix('x'))
                .and_then(parse_number);
            if factor.is_some() {
                return factor;
            }
            match word.as_str() {
                "double" | "twice" => return Some(2.0),
                "triple" => return Some(3.0),
                "half" | "halve" => return Some(0.5),
                _ => {}
            }
        }
        None
    }

    /// "20%" as 0.2
    fn percent(&self) -> Option<f64> {
        self.words.iter().find_map(|w| {
            w.strip_suffix('%')
                .and_then(parse_number)
                .map(|p| p / 100.0)
        })
    }

    /// "1280x720", "720p", "4k"
    fn resolution(&self) -> Option<(usize, Option<u32>, Option<u32>)> {
        for (i, word) in self.words.iter().enumerate() {
            if let Some((w, h)) = word.split_once('x') {
                if let (Ok(w), Ok(h)) = (w.parse::<u32>(), h.parse::<u32>()) {
                    return Some((i, Some(w), Some(h)));
                }
            }
            if let Some(h) = word.strip_suffix('p').and_then(|h| h.parse::<u32>().ok()) {
                return Some((i, None, Some(h)));
            }
            if word == "4k" || word == "uhd" {
                return Some((i, Some(3840), Some(2160)));
            }
        }
        None
    }

    fn aspect(&self) -> Option<(usize, u32, u32)> {
        for (i, word) in self.words.iter().enumerate() {
            if let Some((a, b)) = word.split_once(':') {
                if let (Ok(a), Ok(b)) = (a.parse::<u32>(), b.parse::<u32>()) {
                    if ASPECT_RATIOS.contains(&(a, b)) {
                        return Some((i, a, b));
                    }
                }
            }
            if word == "square" {
                return Some((i, 1, 1));
            }
            if word == "vertical" || word == "portrait" {
                return Some((i, 9, 16));
            }
        }
        None
    }

    /// Strength adverbs mapped onto a 0..1 scale
    fn degree(&self) -> Option<f64> {
        if let Some(p) = self.percent() {
            return Some(p.clamp(0.0, 1.0));
        }
        if self
            .exact(&["lightly", "slightly", "bit", "little", "subtle", "subtly", "gently", "mild"])
            .is_some()
        {
            return Some(0.4);
        }
        if self
            .prefixed(&["strong", "heavi", "aggressiv", "lot", "very", "much", "max"])
            .is_some()
        {
            return Some(0.9);
        }
        None
    }

    fn negated(&self) -> bool {
        self.exact(NEGATIONS).is_some()
    }

    fn rationale(&self, pos: usize) -> String {
        format!("matched '{}' in \"{}\"", self.words[pos], self.text)
    }
}

fn parse_number(text: &str) -> Option<f64> {
    let first = text.chars().next()?;
    if !(first.is_ascii_digit() || first == '-' || first == '.') {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// "10", "10s", "2.5sec", "1:30", "0:01:30"
fn parse_time(word: &str) -> Option<f64> {
    if word.contains(':') {
        let parts: Vec<&str> = word.split(':').collect();
        let clock = parts.len() <= 3
            && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
            && parts[1..].iter().all(|p| p.len() == 2);
        if !clock {
            return None;
        }
        return parts
            .iter()
            .try_fold(0.0, |acc, p| p.parse::<f64>().ok().map(|v| acc * 60.0 + v));
    }
    let number = ["seconds", "second", "secs", "sec", "s"]
        .iter()
        .find_map(|suffix| word.strip_suffix(suffix))
        .unwrap_or(word);
    parse_number(number)
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.chars()
                .filter(|c| c.is_alphanumeric() || matches!(c, '.' | ':' | '%' | '-' | '&'))
                .collect::<String>()
                .trim_start_matches('.')
                .trim_end_matches(['.', '-'])
                .to_string()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

fn split_clauses(instruction: &str) -> Vec<Clause> {
    let lowered = instruction
        .to_lowercase()
        .replace("black and white", "black-and-white")
        .replace("white balance", "white-balance");

    // Sentence boundaries: separators, and periods not inside a number
    let chars: Vec<char> = lowered.chars().collect();
    let mut pieces = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        let boundary = match c {
            ',' | ';' | '\n' | '!' | '?' => true,
            '.' => !chars.get(i + 1).is_some_and(char::is_ascii_digit),
            _ => false,
        };
        if boundary {
            pieces.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    pieces.push(current);

    let mut clauses = Vec::new();
    for piece in pieces {
        let words = tokenize(&piece);
        let mut current: Vec<String> = Vec::new();
        for (i, word) in words.iter().enumerate() {
            // "between 5 and 10" keeps its "and"
            let joins_numbers = word == "and"
                && words
                    .get(i + 1)
                    .is_some_and(|next| parse_time(next).is_some());
            if CONNECTIVES.contains(&word.as_str()) && !joins_numbers {
                if !current.is_empty() {
                    clauses.push(Clause::new(std::mem::take(&mut current)));
                }
                continue;
            }
            current.push(word.clone());
        }
        if !current.is_empty() {
            clauses.push(Clause::new(current));
        }
    }
    clauses
}

type Match = (usize, RawCandidate);

fn match_clause(clause: &Clause, metadata: Option<&AssetMetadata>) -> Vec<Match> {
    let super_resolution = super_resolution_rule(clause);
    let upscale = if super_resolution.is_some() {
        None
    } else {
        upscale_rule(clause, metadata)
    };
    let resize = if super_resolution.is_some() {
        None
    } else {
        resize_rule(clause, metadata, upscale.is_some())
    };

    [
        trim_rule(clause, metadata),
        crop_rule(clause, metadata),
        rotate_rule(clause),
        resize,
        speed_rule(clause),
        brightness_contrast_rule(clause),
        upscale,
        denoise_rule(clause),
        color_rule(clause),
        stabilization_rule(clause),
        super_resolution,
        motion_blur_rule(clause),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn trim_rule(c: &Clause, metadata: Option<&AssetMetadata>) -> Option<Match> {
    let first = c.exact(&["first"]);
    let last = c.exact(&["last"]).filter(|_| first.is_none());
    let pos = c.prefixed(&["trim", "cut", "shorten"]).or_else(|| {
        c.exact(&["keep", "remove", "drop", "skip"])
            .filter(|_| first.is_some() || last.is_some())
    })?;

    // "keep the first 10s" and "trim to the first 10s" keep; "cut the first 5s" removes
    let keeping = c.exact(&["keep", "only"]).is_some()
        || first
            .or(last)
            .is_some_and(|i| c.words[i.saturating_sub(2)..i].iter().any(|w| w == "to"));

    let numbers = c.numbers();
    let mut candidate = RawCandidate::operation("trim").with_rationale(c.rationale(pos));

    if first.is_some() || last.is_some() {
        let Some(&(_, n)) = numbers.first() else {
            return Some((pos, candidate));
        };
        if first.is_some() {
            candidate = if keeping {
                candidate.with_param("start_time", 0.0).with_param("end_time", n)
            } else {
                candidate.with_param("start_time", n)
            };
        } else {
            let Some(duration) = metadata.and_then(|m| m.duration_secs) else {
                return Some((pos, RawCandidate::unrecognized(format!("{} (video length unknown)", c.text))));
            };
            let boundary = (duration - n).max(0.0);
            candidate = if keeping {
                candidate.with_param("start_time", boundary)
            } else {
                candidate.with_param("start_time", 0.0).with_param("end_time", boundary)
            };
        }
        return Some((pos, candidate));
    }

    match numbers.as_slice() {
        [(_, a), (_, b), ..] => {
            candidate = candidate.with_param("start_time", *a).with_param("end_time", *b);
        }
        [(i, a)] => {
            // The word before a lone number says which bound it is: "from 5s" vs "to 10s"
            let from = i.checked_sub(1).is_some_and(|prev| {
                matches!(
                    c.words[prev].as_str(),
                    "from" | "after" | "at" | "start" | "starting" | "since"
                )
            });
            let name = if from { "start_time" } else { "end_time" };
            candidate = candidate.with_param(name, *a);
        }
        [] => {}
    }
    Some((pos, candidate))
}

fn crop_rule(c: &Clause, metadata: Option<&AssetMetadata>) -> Option<Match> {
    let aspect = c.aspect();
    let pos = c
        .prefixed(&["crop"])
        .or_else(|| c.prefixed(&["aspect"]).filter(|_| aspect.is_some()))?;
    let candidate = RawCandidate::operation("crop").with_rationale(c.rationale(pos));

    if let Some((_, Some(w), Some(h))) = c.resolution() {
        return Some((pos, candidate.with_param("width", w).with_param("height", h)));
    }

    let Some((_, rw, rh)) = aspect else {
        return Some((pos, candidate));
    };
    let Some((frame_w, frame_h)) = metadata.and_then(AssetMetadata::resolution) else {
        return Some((
            pos,
            RawCandidate::unrecognized(format!("{} (frame size unknown)", c.text)),
        ));
    };

    let (w, h, x, y) = centered_crop(frame_w, frame_h, rw, rh);
    Some((
        pos,
        candidate
            .with_param("x", x)
            .with_param("y", y)
            .with_param("width", w)
            .with_param("height", h),
    ))
}

/// Largest centered rectangle of ratio `rw:rh`, with even dimensions
fn centered_crop(frame_w: u32, frame_h: u32, rw: u32, rh: u32) -> (u32, u32, u32, u32) {
    let (fw, fh) = (u64::from(frame_w), u64::from(frame_h));
    let (rw, rh) = (u64::from(rw), u64::from(rh));
    let (w, h) = if fw * rh > fh * rw {
        (fh * rw / rh, fh)
    } else {
        (fw, fw * rh / rw)
    };
    let (w, h) = ((w & !1).max(2), (h & !1).max(2));
    let x = (fw.saturating_sub(w)) / 2;
    let y = (fh.saturating_sub(h)) / 2;
    (w as u32, h as u32, x as u32, y as u32)
}

fn rotate_rule(c: &Clause) -> Option<Match> {
    let pos = c
        .prefixed(&["rotat"])
        .or_else(|| c.phrase("upside down"))
        .or_else(|| c.exact(&["flip"]))?;

    let counter = c
        .prefixed(&["counter", "anticlockwise", "anti-clockwise"])
        .or_else(|| c.exact(&["left", "ccw"]))
        .is_some();
    let explicit = c
        .numbers()
        .into_iter()
        .map(|(_, v)| v)
        .filter(|v| v.fract() == 0.0)
        .map(|v| (v as i64).rem_euclid(360))
        .find(|v| matches!(v, 0 | 90 | 180 | 270));

    let angle = match explicit {
        Some(a) if counter => Some((360 - a) % 360),
        Some(a) => Some(a),
        None if c.phrase("upside down").is_some() || c.exact(&["flip"]).is_some() => Some(180),
        None if counter => Some(270),
        None if c.exact(&["right", "clockwise", "cw"]).is_some() => Some(90),
        None => None,
    };

    let mut candidate = RawCandidate::operation("rotate").with_rationale(c.rationale(pos));
    if let Some(angle) = angle {
        candidate = candidate.with_param("angle", angle);
    }
    Some((pos, candidate))
}

fn resize_rule(c: &Clause, metadata: Option<&AssetMetadata>, upscaling: bool) -> Option<Match> {
    let resolution = c.resolution();
    let pos = c
        .prefixed(&["resiz", "rescal", "downscal", "downsiz", "shrink"])
        .or_else(|| c.exact(&["scale"]))
        .or_else(|| {
            // A bare "720p" is a resize unless it belongs to an upscale or crop
            resolution
                .filter(|_| !upscaling && c.prefixed(&["crop"]).is_none())
                .map(|(i, _, _)| i)
        })?;
    let mut candidate = RawCandidate::operation("resize").with_rationale(c.rationale(pos));

    if let Some((_, w, h)) = resolution {
        if let Some(w) = w {
            candidate = candidate.with_param("width", w);
        }
        if let Some(h) = h {
            candidate = candidate.with_param("height", h);
        }
        return Some((pos, candidate));
    }

    let scale = c.percent().or_else(|| c.multiplier());
    if let (Some(scale), Some((w, h))) = (scale, metadata.and_then(AssetMetadata::resolution)) {
        let scaled = |v: u32| ((f64::from(v) * scale / 2.0).round() as u32 * 2).max(2);
        candidate = candidate
            .with_param("width", scaled(w))
            .with_param("height", scaled(h));
    }
    Some((pos, candidate))
}

fn speed_rule(c: &Clause) -> Option<Match> {
    let slow_motion = c
        .phrase("slow motion")
        .or_else(|| c.prefixed(&["slow-mo", "slowmo", "slo-mo"]));
    let pos = slow_motion
        .or_else(|| c.prefixed(&["speed", "faster", "slower", "quicker", "accelerat"]))
        .or_else(|| c.exact(&["slow", "fast"]))?;

    let factor = c
        .multiplier()
        .or_else(|| c.percent().filter(|p| *p > 0.0))
        .unwrap_or_else(|| {
            if slow_motion.is_some() {
                0.5
            } else if c
                .prefixed(&["slow"])
                .or_else(|| c.phrase("speed down"))
                .is_some()
            {
                0.75
            } else {
                1.5
            }
        });

    Some((
        pos,
        RawCandidate::operation("speed_adjust")
            .with_param("speed", factor)
            .with_rationale(c.rationale(pos)),
    ))
}

fn brightness_contrast_rule(c: &Clause) -> Option<Match> {
    let darker = c.prefixed(&["darker", "darken", "dimmer", "dim"]);
    let brighter = c.prefixed(&["bright", "lighter", "lighten"]);
    let contrast = c.prefixed(&["contrast"]);
    let pos = [darker, brighter, contrast].into_iter().flatten().min()?;

    let amount = c.percent().unwrap_or(0.1).clamp(0.0, 1.0);
    let sign = if c.negated() { -1.0 } else { 1.0 };
    let mut candidate =
        RawCandidate::operation("brightness_contrast").with_rationale(c.rationale(pos));

    if darker.is_some() {
        candidate = candidate.with_param("brightness", -amount);
    } else if brighter.is_some() {
        candidate = candidate.with_param("brightness", sign * amount);
    }
    if contrast.is_some() {
        candidate = candidate.with_param("contrast", sign * amount);
    }
    Some((pos, candidate))
}

fn upscale_rule(c: &Clause, metadata: Option<&AssetMetadata>) -> Option<Match> {
    let pos = c
        .prefixed(&["upscal", "upsampl", "enlarg"])
        .or_else(|| c.phrase("higher resolution"))
        .or_else(|| c.phrase("increase resolution"))
        .or_else(|| c.phrase("increase the resolution"))?;
    let mut candidate = RawCandidate::operation("upscale").with_rationale(c.rationale(pos));

    let target_height = c.resolution().and_then(|(_, _, h)| h);
    let factor = c.multiplier().or_else(|| {
        let current = metadata.and_then(|m| m.height)?;
        let target = target_height?;
        let factor = f64::from(target) / f64::from(current);
        Some((factor * 100.0).round() / 100.0)
    });
    if let Some(factor) = factor {
        candidate = candidate.with_param("factor", factor.clamp(1.0, 4.0));
    }
    Some((pos, candidate))
}

fn denoise_rule(c: &Clause) -> Option<Match> {
    let pos = c
        .prefixed(&["denois", "de-nois", "noise", "noisy", "grain"])
        .or_else(|| c.phrase("clean up"))?;
    let mut candidate = RawCandidate::operation("denoise").with_rationale(c.rationale(pos));
    if let Some(intensity) = c.degree() {
        candidate = candidate.with_param("intensity", intensity);
    }
    Some((pos, candidate))
}

fn color_rule(c: &Clause) -> Option<Match> {
    let mono = c.prefixed(&["grayscale", "greyscale", "black-and-white", "monochrome"]);
    let pos = mono.or_else(|| {
        c.prefixed(&[
            "color",
            "colour",
            "saturat",
            "desaturat",
            "vibran",
            "vivid",
            "muted",
            "white-balance",
            "grade",
            "grading",
        ])
    })?;

    let saturation = if mono.is_some() {
        Some(0.0)
    } else if c.prefixed(&["desaturat", "muted"]).is_some() || c.negated() {
        Some(0.7)
    } else if c.prefixed(&["saturat", "vibran", "vivid"]).is_some() {
        Some(1.3)
    } else {
        None
    };

    let mut candidate = RawCandidate::operation("color_correction").with_rationale(c.rationale(pos));
    if let Some(saturation) = saturation {
        candidate = candidate.with_param("saturation", saturation);
    }
    if let Some(intensity) = c.degree() {
        candidate = candidate.with_param("intensity", intensity);
    }
    Some((pos, candidate))
}

fn stabilization_rule(c: &Clause) -> Option<Match> {
    let pos = c.prefixed(&["stabil", "steady", "steadi", "shak", "jitter", "wobbl"])?;
    let mut candidate = RawCandidate::operation("stabilization").with_rationale(c.rationale(pos));
    if let Some(degree) = c.degree() {
        let radius = (degree * 48.0).round().clamp(4.0, 64.0) as i64;
        candidate = candidate.with_param("radius", radius);
    }
    Some((pos, candidate))
}

fn super_resolution_rule(c: &Clause) -> Option<Match> {
    let pos = c
        .phrase("super resolution")
        .or_else(|| c.prefixed(&["super-res", "superres"]))?;
    let mut candidate =
        RawCandidate::operation("super_resolution").with_rationale(c.rationale(pos));
    if let Some(factor) = c.multiplier() {
        candidate = candidate.with_param("factor", factor.round() as i64);
    }
    Some((pos, candidate))
}

fn motion_blur_rule(c: &Clause) -> Option<Match> {
    let pos = c
        .phrase("motion blur")
        .or_else(|| c.prefixed(&["deblur", "blur", "sharpen", "sharper", "crisp"]))?;
    let mut candidate =
        RawCandidate::operation("motion_blur_removal").with_rationale(c.rationale(pos));
    if let Some(intensity) = c.degree() {
        candidate = candidate.with_param("intensity", intensity);
    }
    Some((pos, candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kinds(candidates: &[RawCandidate]) -> Vec<String> {
        candidates
            .iter()
            .map(|c| match c {
                RawCandidate::Operation { kind, .. } => kind.clone(),
                RawCandidate::Unrecognized { text } => format!("?{text}"),
            })
            .collect()
    }

    fn params(candidate: &RawCandidate) -> serde_json::Value {
        match candidate {
            RawCandidate::Operation { params, .. } => serde_json::Value::Object(params.clone()),
            RawCandidate::Unrecognized { .. } => serde_json::Value::Null,
        }
    }

    fn hd(duration: f64) -> AssetMetadata {
        AssetMetadata {
            duration_secs: Some(duration),
            width: Some(1920),
            height: Some(1080),
        }
    }

    #[test]
    fn test_clause_splitting_keeps_number_ranges() {
        let clauses = split_clauses("Trim between 5 and 10.5 seconds, then rotate it. Denoise & stabilize");
        let texts: Vec<&str> = clauses.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["trim between 5 and 10.5 seconds", "rotate it", "denoise", "stabilize"]
        );
    }

    #[test]
    fn test_trim_and_rotate() {
        let out = KeywordInterpreter.parse("trim from 0 to 10 seconds and rotate 90 degrees", None);
        assert_eq!(kinds(&out), vec!["trim", "rotate"]);
        assert_eq!(params(&out[0]), json!({"start_time": 0.0, "end_time": 10.0}));
        assert_eq!(params(&out[1]), json!({"angle": 90}));
    }

    #[test]
    fn test_trim_variants() {
        let k = KeywordInterpreter;
        assert_eq!(
            params(&k.parse("keep the first 30 seconds", None)[0]),
            json!({"start_time": 0.0, "end_time": 30.0})
        );
        assert_eq!(
            params(&k.parse("cut the first 5s", None)[0]),
            json!({"start_time": 5.0})
        );
        assert_eq!(
            params(&k.parse("trim from 1:30 to 2 minutes", None)[0]),
            json!({"start_time": 90.0, "end_time": 120.0})
        );
        assert_eq!(
            params(&k.parse("remove the last 10 seconds", Some(&hd(60.0)))[0]),
            json!({"start_time": 0.0, "end_time": 50.0})
        );
        assert_eq!(
            kinds(&k.parse("remove the last 10 seconds", None)),
            vec!["?remove the last 10 seconds (video length unknown)"]
        );
        // No bounds: left for the compiler to reject
        assert_eq!(params(&k.parse("trim it", None)[0]), json!({}));
    }

    #[test]
    fn test_rotate_directions() {
        let k = KeywordInterpreter;
        assert_eq!(params(&k.parse("rotate left", None)[0]), json!({"angle": 270}));
        assert_eq!(
            params(&k.parse("rotate 90 counterclockwise", None)[0]),
            json!({"angle": 270})
        );
        assert_eq!(params(&k.parse("flip it upside down", None)[0]), json!({"angle": 180}));
        assert_eq!(params(&k.parse("rotate -90", None)[0]), json!({"angle": 270}));
    }

    #[test]
    fn test_crop_to_aspect_uses_frame_size() {
        let out = KeywordInterpreter.parse("crop to 1:1", Some(&hd(10.0)));
        assert_eq!(
            params(&out[0]),
            json!({"x": 420, "y": 0, "width": 1080, "height": 1080})
        );

        let out = KeywordInterpreter.parse("crop to 16:9", None);
        assert_eq!(kinds(&out), vec!["?crop to 16:9 (frame size unknown)"]);

        let out = KeywordInterpreter.parse("crop to 640x480", None);
        assert_eq!(params(&out[0]), json!({"width": 640, "height": 480}));
    }

    #[test]
    fn test_resize_and_upscale() {
        let k = KeywordInterpreter;
        assert_eq!(params(&k.parse("resize to 1280x720", None)[0]), json!({"width": 1280, "height": 720}));
        assert_eq!(kinds(&k.parse("make it 720p", None)), vec!["resize"]);
        assert_eq!(params(&k.parse("make it 720p", None)[0]), json!({"height": 720}));

        let out = k.parse("upscale to 4k", Some(&hd(10.0)));
        assert_eq!(kinds(&out), vec!["upscale"]);
        assert_eq!(params(&out[0]), json!({"factor": 2.0}));

        assert_eq!(params(&k.parse("upscale 3x", None)[0]), json!({"factor": 3.0}));
        assert_eq!(
            kinds(&k.parse("apply super resolution 4x", None)),
            vec!["super_resolution"]
        );
    }

    #[test]
    fn test_speed() {
        let k = KeywordInterpreter;
        assert_eq!(params(&k.parse("speed up 2x", None)[0]), json!({"speed": 2.0}));
        assert_eq!(params(&k.parse("slow motion please", None)[0]), json!({"speed": 0.5}));
        assert_eq!(params(&k.parse("play at half speed", None)[0]), json!({"speed": 0.5}));
        assert_eq!(params(&k.parse("make it faster", None)[0]), json!({"speed": 1.5}));
    }

    #[test]
    fn test_brightness_contrast_and_color() {
        let k = KeywordInterpreter;
        assert_eq!(params(&k.parse("make it brighter", None)[0]), json!({"brightness": 0.1}));
        assert_eq!(
            params(&k.parse("darker by 20%", None)[0]),
            json!({"brightness": -0.2})
        );
        assert_eq!(
            params(&k.parse("reduce contrast", None)[0]),
            json!({"contrast": -0.1})
        );
        let mono = k.parse("make it black and white", None);
        assert_eq!(kinds(&mono), vec!["color_correction"]);
        assert_eq!(params(&mono[0]), json!({"saturation": 0.0}));
    }

    #[test]
    fn test_enhancements_in_reading_order() {
        let out = KeywordInterpreter.parse(
            "stabilize the shaky footage then lightly denoise, sharpen the blurry parts",
            None,
        );
        assert_eq!(kinds(&out), vec!["stabilization", "denoise", "motion_blur_removal"]);
        assert_eq!(params(&out[1]), json!({"intensity": 0.4}));
    }

    #[test]
    fn test_unmatched_clauses_are_reported() {
        let out = KeywordInterpreter.parse("make it louder", None);
        assert_eq!(kinds(&out), vec!["?make it louder"]);

        let out = KeywordInterpreter.parse("add music and denoise", None);
        assert_eq!(kinds(&out), vec!["?add music", "denoise"]);
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time("10"), Some(10.0));
        assert_eq!(parse_time("2.5sec"), Some(2.5));
        assert_eq!(parse_time("1:30"), Some(90.0));
        assert_eq!(parse_time("16:9"), None);
        assert_eq!(parse_time("seconds"), None);
        assert_eq!(parse_time("inf"), None);
    }
}
