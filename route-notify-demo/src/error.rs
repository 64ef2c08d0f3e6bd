use route_notify::RouteTableError;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

pub enum DemoError {
    ConfigRead {
        path: String,
        source: std::io::Error,
    },
    ConfigParse(json5::Error),
    Registry(RouteTableError),
    Io(std::io::Error),
    Json(serde_json::Error),
    WorkerPanicked(&'static str),
}

impl Display for DemoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DemoError::ConfigRead { path, source } => {
                write!(f, "unable to read config file {path}: {source}")
            }
            DemoError::ConfigParse(err) => write!(f, "unable to parse config file: {err}"),
            DemoError::Registry(err) => write!(f, "route registry error: {err}"),
            DemoError::Io(err) => write!(f, "I/O error: {err}"),
            DemoError::Json(err) => write!(f, "unable to encode route table: {err}"),
            DemoError::WorkerPanicked(name) => write!(f, "worker thread {name} panicked"),
        }
    }
}

// `main` prints the returned error with `Debug`; keep that readable.
impl Debug for DemoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Error for DemoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DemoError::ConfigRead { source, .. } => Some(source),
            DemoError::ConfigParse(err) => Some(err),
            DemoError::Registry(err) => Some(err),
            DemoError::Io(err) => Some(err),
            DemoError::Json(err) => Some(err),
            DemoError::WorkerPanicked(_) => None,
        }
    }
}

impl From<json5::Error> for DemoError {
    fn from(err: json5::Error) -> Self {
        DemoError::ConfigParse(err)
    }
}

impl From<RouteTableError> for DemoError {
    fn from(err: RouteTableError) -> Self {
        DemoError::Registry(err)
    }
}

impl From<std::io::Error> for DemoError {
    fn from(err: std::io::Error) -> Self {
        DemoError::Io(err)
    }
}

impl From<serde_json::Error> for DemoError {
    fn from(err: serde_json::Error) -> Self {
        DemoError::Json(err)
    }
}
