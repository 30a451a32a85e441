// Release builds are GUI-subsystem binaries on Windows; headless mode is
// meant for terminals and scripts on every platform.
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use eframe::egui;
use genfill::app::GenFillApp;
use genfill::{cli, logger};

/// Attach to the launching terminal and point the std handles at it.
///
/// Release builds never get a console of their own, so without this the
/// headless mode's summary and log lines go nowhere.
#[cfg(target_os = "windows")]
fn attach_parent_console() {
    unsafe extern "system" {
        fn AttachConsole(dwProcessId: u32) -> i32;
        fn SetStdHandle(nStdHandle: u32, hHandle: isize) -> i32;
        fn CreateFileW(
            lpFileName: *const u16,
            dwDesiredAccess: u32,
            dwShareMode: u32,
            lpSecurityAttributes: *const std::ffi::c_void,
            dwCreationDisposition: u32,
            dwFlagsAndAttributes: u32,
            hTemplateFile: isize,
        ) -> isize;
    }
    const ATTACH_PARENT_PROCESS: u32 = 0xFFFF_FFFF;
    const GENERIC_READ: u32 = 0x8000_0000;
    const GENERIC_WRITE: u32 = 0x4000_0000;
    const FILE_SHARE_READ_WRITE: u32 = 0x0000_0003;
    const OPEN_EXISTING: u32 = 3;
    const STD_INPUT_HANDLE: u32 = 0xFFFF_FFF6; // -10
    const STD_OUTPUT_HANDLE: u32 = 0xFFFF_FFF5; // -11
    const STD_ERROR_HANDLE: u32 = 0xFFFF_FFF4; // -12
    const INVALID_HANDLE_VALUE: isize = -1;

    let open = |name: &str, access: u32| -> isize {
        let wide: Vec<u16> = name.encode_utf16().chain(std::iter::once(0)).collect();
        unsafe {
            CreateFileW(
                wide.as_ptr(),
                access,
                FILE_SHARE_READ_WRITE,
                std::ptr::null(),
                OPEN_EXISTING,
                0,
                0,
            )
        }
    };

    unsafe {
        if AttachConsole(ATTACH_PARENT_PROCESS) == 0 {
            return;
        }
    }
    let out = open("CONOUT$", GENERIC_WRITE);
    if out != INVALID_HANDLE_VALUE {
        unsafe {
            SetStdHandle(STD_OUTPUT_HANDLE, out);
            SetStdHandle(STD_ERROR_HANDLE, out);
        }
    }
    let input = open("CONIN$", GENERIC_READ);
    if input != INVALID_HANDLE_VALUE {
        unsafe {
            SetStdHandle(STD_INPUT_HANDLE, input);
        }
    }
}

fn main() -> Result<(), eframe::Error> {
    // -- CLI / headless mode ---------------------------------------------
    if cli::CliArgs::is_cli_mode() {
        use clap::Parser;
        #[cfg(target_os = "windows")]
        attach_parent_console();
        logger::init_console();
        let args = cli::CliArgs::parse();
        let code = cli::run(args);
        std::process::exit(if code == std::process::ExitCode::SUCCESS {
            0
        } else {
            1
        });
    }

    // -- GUI mode -----------------------------------------------------

    // Initialize session log (overwrites previous session log)
    logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_title("GenFill"),
        ..Default::default()
    };

    eframe::run_native(
        "GenFill",
        options,
        Box::new(|cc| Box::new(GenFillApp::new(cc))),
    )
}
