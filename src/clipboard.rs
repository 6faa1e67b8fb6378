use crate::error::{KeyflowError, Result};
use arboard::Clipboard;

/// Text clipboard used by the paste path of a fire.
pub trait ClipboardAccess: Send {
    /// Current text contents, `None` when the clipboard is empty or holds
    /// something other than text.
    fn get_text(&mut self) -> Result<Option<String>>;
    fn set_text(&mut self, text: &str) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

/// The system clipboard.
///
/// One `arboard` handle is kept open between calls: on X11 and Wayland the
/// pasted selection is only served while a handle is alive. A handle that
/// reports an error is dropped and reopened on the next access.
#[derive(Default)]
pub struct SystemClipboard {
    handle: Option<Clipboard>,
}

impl SystemClipboard {
    /// Open the clipboard now, failing if the platform offers none.
    pub fn open() -> Result<Self> {
        let handle = Clipboard::new().map_err(|e| KeyflowError::Clipboard(e.to_string()))?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    fn with_handle<T>(
        &mut self,
        op: impl FnOnce(&mut Clipboard) -> std::result::Result<T, arboard::Error>,
    ) -> std::result::Result<T, arboard::Error> {
        let mut handle = match self.handle.take() {
            Some(handle) => handle,
            None => Clipboard::new()?,
        };
        let result = op(&mut handle);
        match &result {
            Ok(_) | Err(arboard::Error::ContentNotAvailable) => self.handle = Some(handle),
            Err(e) => tracing::debug!("Dropping clipboard handle: {}", e),
        }
        result
    }
}

impl ClipboardAccess for SystemClipboard {
    fn get_text(&mut self) -> Result<Option<String>> {
        match self.with_handle(|clipboard| clipboard.get_text()) {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(KeyflowError::Clipboard(e.to_string())),
        }
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        self.with_handle(|clipboard| clipboard.set_text(text))
            .map_err(|e| KeyflowError::Clipboard(e.to_string()))
    }

    fn clear(&mut self) -> Result<()> {
        self.with_handle(|clipboard| clipboard.clear())
            .map_err(|e| KeyflowError::Clipboard(e.to_string()))
    }
}

/// Placeholder for environments without clipboard access; every call fails,
/// which sends fires down the direct typing path.
#[derive(Debug, Default)]
pub struct NoClipboard;

impl ClipboardAccess for NoClipboard {
    fn get_text(&mut self) -> Result<Option<String>> {
        Err(KeyflowError::Clipboard("clipboard unavailable".to_string()))
    }

    fn set_text(&mut self, _text: &str) -> Result<()> {
        Err(KeyflowError::Clipboard("clipboard unavailable".to_string()))
    }

    fn clear(&mut self) -> Result<()> {
        Err(KeyflowError::Clipboard("clipboard unavailable".to_string()))
    }
}
