use std::sync::Once;

use log::LevelFilter;
use log4rs::{
    append::console::ConsoleAppender,
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    Config,
};

mod keyframe_edit;
mod scene_scenario;
mod tick_order;

static INIT: Once = Once::new();

pub fn init_logger() {
    INIT.call_once(|| {
        let stdout = ConsoleAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{l} {t} - {m}{n}")))
            .build();
        let config = Config::builder()
            .appender(Appender::builder().build("stdout", Box::new(stdout)))
            .build(Root::builder().appender("stdout").build(LevelFilter::Info));
        if let Ok(config) = config {
            let _ = log4rs::init_config(config);
        }
    });
}
