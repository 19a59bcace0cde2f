pub mod frame;
pub mod loader;
pub mod types;
pub mod yahoo;

pub use frame::{Column, Frame, FrameError};
pub use loader::{dataframe_to_prices, frame_to_dataframe, DataLoader, LoaderError};
pub use types::{bars_to_frame, clean_bars, frame_to_bars, PriceBar, CLOSE, HIGH, LOW, OPEN, PRICE_COLUMNS, VOLUME};
pub use yahoo::{require_bars, YahooClient, YahooConfig, YahooError};
