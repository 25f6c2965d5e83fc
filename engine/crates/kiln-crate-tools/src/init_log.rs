use std::{cell::RefCell, io::Write};

use log::Log;

thread_local! {
    static CAPTURED: RefCell<Vec<(log::Level, String)>> = const { RefCell::new(Vec::new()) };
}

fn builder() -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder
        .format(|buf, record| {
            let info_style = buf
                .default_level_style(log::Level::Info)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green)));
            let warn_style = buf
                .default_level_style(log::Level::Warn)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow)));
            let error_style = buf
                .default_level_style(log::Level::Error)
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red)));

            let level_style = match record.level() {
                log::Level::Info => info_style,
                log::Level::Warn => warn_style,
                log::Level::Error => error_style,
                _ => buf.default_level_style(record.level()),
            };
            let grey_style = info_style.fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(110, 110, 110))));
            let black_style = info_style.fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(75, 75, 75))));

            let line = record.line().unwrap_or(!0);
            // windows 和 unix 的路径分隔符都要处理
            let file = record.file().unwrap_or("").rsplit(['\\', '/']).next().unwrap_or("");
            let time = chrono::Local::now().format("%H:%M:%S%.3f");
            let level = record.level();

            writeln!(
                buf,
                "{level_style}[{time}] {level:<5}{level_style:#} {grey_style}[{file}:{line}]{grey_style:#} \
                 {black_style}{}{black_style:#}",
                record.args()
            )
        })
        .filter(None, log::LevelFilter::Info)
        // RUST_LOG 可以覆盖默认的 Info 级别
        .parse_default_env();
    builder
}

/// 安装全局 logger，重复调用会 panic
pub fn init_log() {
    builder().init();
}

/// 测试用的 logger：转发给 env_logger，同时把每条记录留在产生它的线程上
struct CaptureLogger {
    inner: env_logger::Logger,
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        CAPTURED.with_borrow_mut(|logs| logs.push((record.level(), record.args().to_string())));
        if self.inner.matches(record) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// 同 [`init_log`]，但已经有 logger 时直接返回 false
///
/// 测试里每个用例都会调用一次，输出交给 libtest 捕获。
/// 所有级别的记录都会留在当前线程，用 [`take_captured_logs`] 取出。
pub fn try_init_log() -> bool {
    let logger = CaptureLogger {
        inner: builder().is_test(true).build(),
    };
    let installed = log::set_boxed_logger(Box::new(logger)).is_ok();
    if installed {
        log::set_max_level(log::LevelFilter::Trace);
    }
    installed
}

/// 取出并清空当前线程上记录的日志
///
/// 只有通过 [`try_init_log`] 安装的 logger 会记录
pub fn take_captured_logs() -> Vec<(log::Level, String)> {
    CAPTURED.with_borrow_mut(std::mem::take)
}
