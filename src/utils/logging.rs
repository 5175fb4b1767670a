// 日志工具模块
//
// 封装 flexi_logger 的初始化。句柄直接返回给调用方而不是存放在静态变量中，
// 由宿主决定何时 flush 日志。

use crate::config::LogConfig;
use flexi_logger::{
    Cleanup, Criterion, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming, WriteMode,
};

/// 按 `config` 启动文件日志
///
/// 在需要写日志期间保持返回的句柄存活，进程退出前将其传给 [`shutdown`]。
///
/// # Examples
/// ```no_run
/// use viewdb::config::LogConfig;
/// use viewdb::utils::logging;
///
/// let handle = logging::init(&LogConfig::default()).expect("logger should start");
/// log::info!("ready");
/// logging::shutdown(handle);
/// ```
pub fn init(config: &LogConfig) -> Result<LoggerHandle, FlexiLoggerError> {
    let handle = Logger::try_with_str(&config.level)?
        .log_to_file(
            FileSpec::default()
                .basename(&config.file)
                .directory(&config.dir),
        )
        .rotate(
            Criterion::Size(config.max_file_size),
            Naming::Numbers,
            Cleanup::KeepLogFiles(config.max_files),
        )
        .write_mode(WriteMode::Async)
        .append()
        .start()?;

    log::info!("logging initialised: {}/{}", config.dir, config.file);
    Ok(handle)
}

/// flush 尚未写出的异步日志并停止日志系统
pub fn shutdown(handle: LoggerHandle) {
    handle.flush();
    // drop 句柄会等待异步写线程结束
    drop(handle);
}
