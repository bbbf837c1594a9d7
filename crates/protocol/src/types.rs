use std::fmt;

use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};

/// Kind of capturable source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Screen,
    Window,
}

impl SourceKind {
    /// Id prefix used by the desktop capture API (`screen:0`, `window:42`).
    pub fn id_prefix(&self) -> &'static str {
        match self {
            SourceKind::Screen => "screen:",
            SourceKind::Window => "window:",
        }
    }
}

/// Set of source kinds requested from the enumerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceKinds {
    screen: bool,
    window: bool,
}

impl SourceKinds {
    /// Screens and windows.
    pub fn all() -> Self {
        Self {
            screen: true,
            window: true,
        }
    }

    /// A single kind.
    pub fn only(kind: SourceKind) -> Self {
        let mut kinds = Self {
            screen: false,
            window: false,
        };
        kinds.insert(kind);
        kinds
    }

    pub fn insert(&mut self, kind: SourceKind) {
        match kind {
            SourceKind::Screen => self.screen = true,
            SourceKind::Window => self.window = true,
        }
    }

    pub fn contains(&self, kind: SourceKind) -> bool {
        match kind {
            SourceKind::Screen => self.screen,
            SourceKind::Window => self.window,
        }
    }

    /// Kinds in the set, screens first.
    pub fn to_vec(&self) -> Vec<SourceKind> {
        let mut out = Vec::with_capacity(2);
        if self.screen {
            out.push(SourceKind::Screen);
        }
        if self.window {
            out.push(SourceKind::Window);
        }
        out
    }
}

impl Default for SourceKinds {
    fn default() -> Self {
        Self::all()
    }
}

impl FromIterator<SourceKind> for SourceKinds {
    /// An empty iterator yields [`SourceKinds::all`], matching the host API
    /// default of listing everything.
    fn from_iter<I: IntoIterator<Item = SourceKind>>(iter: I) -> Self {
        let mut kinds = Self {
            screen: false,
            window: false,
        };
        for kind in iter {
            kinds.insert(kind);
        }
        if !kinds.screen && !kinds.window {
            return Self::all();
        }
        kinds
    }
}

/// An image (thumbnail or application icon) returned by the host.
///
/// Serialized as a `data:` URL so UIs can render it directly.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ImageBlob {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageBlob {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    /// Parses a base64 `data:` URL. Returns `None` for anything else.
    pub fn from_data_url(url: &str) -> Option<Self> {
        let rest = url.strip_prefix("data:")?;
        let (mime, payload) = rest.split_once(";base64,")?;
        let bytes = general_purpose::STANDARD.decode(payload).ok()?;
        Some(Self::new(mime, bytes))
    }
}

impl fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBlob")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl From<ImageBlob> for String {
    fn from(blob: ImageBlob) -> Self {
        blob.to_data_url()
    }
}

impl TryFrom<String> for ImageBlob {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ImageBlob::from_data_url(&value).ok_or_else(|| "expected a base64 data URL".to_string())
    }
}

/// A capturable screen or window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSource {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_icon: Option<ImageBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ImageBlob>,
}

impl CaptureSource {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_id: None,
            name: name.into(),
            app_icon: None,
            thumbnail: None,
        }
    }

    /// Kind derived from the id prefix. `None` for ids the capture API
    /// would not have produced.
    pub fn kind(&self) -> Option<SourceKind> {
        [SourceKind::Screen, SourceKind::Window]
            .into_iter()
            .find(|k| self.id.starts_with(k.id_prefix()))
    }
}

/// Coarse user availability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    #[default]
    Online,
    Away,
}

impl Presence {
    pub fn toggled(self) -> Self {
        match self {
            Presence::Online => Presence::Away,
            Presence::Away => Presence::Online,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Presence::Online => "online",
            Presence::Away => "away",
        }
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_kind_from_id_prefix() {
        assert_eq!(
            CaptureSource::new("screen:0", "Screen 1").kind(),
            Some(SourceKind::Screen)
        );
        assert_eq!(
            CaptureSource::new("window:1", "Chrome").kind(),
            Some(SourceKind::Window)
        );
        assert_eq!(CaptureSource::new("camera:0", "Webcam").kind(), None);
    }

    #[test]
    fn source_kinds_set_operations() {
        let screens = SourceKinds::only(SourceKind::Screen);
        assert!(screens.contains(SourceKind::Screen));
        assert!(!screens.contains(SourceKind::Window));
        assert_eq!(SourceKinds::all().to_vec(), vec![SourceKind::Screen, SourceKind::Window]);
    }

    #[test]
    fn empty_kind_list_means_everything() {
        let kinds: SourceKinds = std::iter::empty().collect();
        assert_eq!(kinds, SourceKinds::all());
        let windows: SourceKinds = [SourceKind::Window].into_iter().collect();
        assert_eq!(windows, SourceKinds::only(SourceKind::Window));
    }

    #[test]
    fn image_blob_data_url() {
        let blob = ImageBlob::new("image/png", vec![1, 2, 3]);
        let url = blob.to_data_url();
        assert_eq!(url, "data:image/png;base64,AQID");
        assert_eq!(ImageBlob::from_data_url(&url), Some(blob));
        assert!(ImageBlob::from_data_url("https://example.com/x.png").is_none());
    }

    #[test]
    fn capture_source_serializes_camel_case_and_data_urls() {
        let mut src = CaptureSource::new("screen:0", "Screen 1");
        src.display_id = Some("1".into());
        src.thumbnail = Some(ImageBlob::new("image/png", vec![0xff]));
        let v = serde_json::to_value(&src).unwrap();
        assert_eq!(v["displayId"], "1");
        assert_eq!(v["thumbnail"], "data:image/png;base64,/w==");
        assert!(v.get("appIcon").is_none());

        let back: CaptureSource = serde_json::from_value(v).unwrap();
        assert_eq!(back, src);
    }

    #[test]
    fn presence_toggle_and_wire_name() {
        assert_eq!(Presence::Online.toggled(), Presence::Away);
        assert_eq!(Presence::Away.toggled(), Presence::Online);
        assert_eq!(serde_json::to_string(&Presence::Away).unwrap(), "\"away\"");
        assert_eq!(Presence::default(), Presence::Online);
        assert_eq!(Presence::Away.to_string(), "away");
    }
}
