use crate::{config::RingConfig, ring::RingSizeProvider};

/// Ring size taken from configuration instead of the window manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedRingSize(pub usize);

impl RingSizeProvider for FixedRingSize {
    fn eligible_windows(&mut self) -> anyhow::Result<usize> {
        Ok(self.0)
    }
}

pub fn default_provider(config: &RingConfig) -> Box<dyn RingSizeProvider + Send> {
    if let Some(size) = config.fixed_size {
        log::info!("using fixed switcher size of {size}");
        return Box::new(FixedRingSize(size));
    }

    #[cfg(windows)]
    {
        Box::new(win32::Win32Desktop)
    }
    #[cfg(not(windows))]
    {
        Box::new(wmctrl::WmctrlDesktop)
    }
}

#[cfg(windows)]
pub mod win32 {
    use anyhow::Context;
    use windows::Win32::{
        Foundation::{BOOL, HWND, LPARAM, TRUE},
        System::Com::{CLSCTX_ALL, COINIT_APARTMENTTHREADED, CoCreateInstance, CoInitializeEx},
        UI::{
            Shell::{IVirtualDesktopManager, VirtualDesktopManager},
            WindowsAndMessaging::{
                EnumWindows, GW_OWNER, GWL_EXSTYLE, GetWindow, GetWindowLongW,
                GetWindowTextLengthW, IsWindowVisible, WS_EX_TOOLWINDOW,
            },
        },
    };

    use crate::ring::RingSizeProvider;

    /// Counts the windows Alt+Tab would list on the current virtual desktop.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Win32Desktop;

    impl RingSizeProvider for Win32Desktop {
        fn eligible_windows(&mut self) -> anyhow::Result<usize> {
            let mut handles: Vec<HWND> = Vec::new();
            unsafe {
                EnumWindows(Some(collect), LPARAM(&mut handles as *mut Vec<HWND> as isize))
                    .context("EnumWindows failed")?;
            }

            let desktops = virtual_desktops();
            let count = handles
                .into_iter()
                .filter(|&hwnd| is_switcher_window(hwnd))
                .filter(|&hwnd| match &desktops {
                    Some(manager) => unsafe {
                        manager
                            .IsWindowOnCurrentVirtualDesktop(hwnd)
                            .map(|on| on.as_bool())
                            .unwrap_or(true)
                    },
                    None => true,
                })
                .count();

            log::debug!("{count} switchable windows on the current desktop");
            Ok(count)
        }
    }

    unsafe extern "system" fn collect(hwnd: HWND, lparam: LPARAM) -> BOOL {
        let handles = unsafe { &mut *(lparam.0 as *mut Vec<HWND>) };
        handles.push(hwnd);
        TRUE
    }

    fn is_switcher_window(hwnd: HWND) -> bool {
        unsafe {
            if !IsWindowVisible(hwnd).as_bool() || GetWindowTextLengthW(hwnd) <= 0 {
                return false;
            }
            let ex_style = GetWindowLongW(hwnd, GWL_EXSTYLE) as u32;
            if ex_style & WS_EX_TOOLWINDOW.0 != 0 {
                return false;
            }
            GetWindow(hwnd, GW_OWNER).map_or(true, |owner| owner.is_invalid())
        }
    }

    fn virtual_desktops() -> Option<IVirtualDesktopManager> {
        unsafe {
            // Already-initialised apartments report S_FALSE, which is fine.
            let _ = CoInitializeEx(None, COINIT_APARTMENTTHREADED);
            match CoCreateInstance(&VirtualDesktopManager, None, CLSCTX_ALL) {
                Ok(manager) => Some(manager),
                Err(err) => {
                    log::warn!("virtual desktop manager unavailable: {err}");
                    None
                }
            }
        }
    }
}

#[cfg(not(windows))]
pub mod wmctrl {
    use std::process::Command;

    use anyhow::{Context, bail};

    use crate::ring::RingSizeProvider;

    /// Counts managed windows on the current desktop through `wmctrl`.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct WmctrlDesktop;

    impl RingSizeProvider for WmctrlDesktop {
        fn eligible_windows(&mut self) -> anyhow::Result<usize> {
            let desktops = run(&["-d"])?;
            let current = current_desktop(&desktops);
            let windows = run(&["-l"])?;
            let count = count_windows(&windows, current);
            log::debug!("{count} windows on desktop {current:?}");
            Ok(count)
        }
    }

    fn run(args: &[&str]) -> anyhow::Result<String> {
        let output = Command::new("wmctrl")
            .args(args)
            .output()
            .context("failed to run wmctrl")?;
        if !output.status.success() {
            bail!(
                "wmctrl {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Desktop marked `*` in `wmctrl -d` output.
    pub fn current_desktop(listing: &str) -> Option<i64> {
        listing.lines().find_map(|line| {
            let mut fields = line.split_whitespace();
            let id = fields.next()?.parse().ok()?;
            (fields.next()? == "*").then_some(id)
        })
    }

    /// Windows from `wmctrl -l` on `desktop` or sticky (-1). Without a known
    /// desktop every listed window counts.
    pub fn count_windows(listing: &str, desktop: Option<i64>) -> usize {
        listing
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1)?.parse::<i64>().ok())
            .filter(|&on| match desktop {
                Some(current) => on == current || on == -1,
                None => true,
            })
            .count()
    }

}
