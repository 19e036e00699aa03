pub mod dispatch;
mod example;
