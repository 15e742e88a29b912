//! Validation layer messages and statistics
//!
//! With the `vulkan-validation` feature the debug messenger forwards every
//! message to the Prism logger and counts it. Without the feature the
//! counters stay at zero.

use colored::*;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Validation message counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn snapshot(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }
}

static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Occurrences per message ID, for grouping repeated messages
static MESSAGE_COUNTS: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Count one more occurrence of `message_id`, returns the new count
#[cfg(any(test, feature = "vulkan-validation"))]
fn track_message(message_id: &str) -> u32 {
    let Ok(mut guard) = MESSAGE_COUNTS.lock() else {
        return 1;
    };
    let counts = guard.get_or_insert_with(FxHashMap::default);
    let count = counts.entry(message_id.to_string()).or_insert(0);
    *count += 1;
    *count
}

/// Current validation statistics
pub fn get_validation_stats() -> ValidationStats {
    VALIDATION_STATS.snapshot()
}

/// Print a colored summary of the validation messages seen so far
pub fn print_validation_stats_report() {
    let stats = get_validation_stats();

    println!("{}", "=== Vulkan validation report ===".bright_blue().bold());
    if stats.total() == 0 {
        println!("  {}", "No validation messages".green());
        return;
    }
    println!("  {:<10} {}", "Errors".red().bold(), stats.errors);
    println!("  {:<10} {}", "Warnings".yellow().bold(), stats.warnings);
    println!("  {:<10} {}", "Info".cyan(), stats.info);
    println!("  {:<10} {}", "Verbose".bright_black(), stats.verbose);

    if let Ok(guard) = MESSAGE_COUNTS.lock() {
        if let Some(counts) = guard.as_ref() {
            let mut repeated: Vec<_> = counts.iter().filter(|(_, &count)| count > 1).collect();
            repeated.sort_by(|a, b| b.1.cmp(a.1));
            for (message_id, count) in repeated.into_iter().take(5) {
                println!("  {} {}", format!("[×{}]", count).yellow(), message_id.white());
            }
        }
    }
}

#[cfg(feature = "vulkan-validation")]
pub(crate) use messenger::{create_debug_messenger, VALIDATION_LAYER};

#[cfg(feature = "vulkan-validation")]
mod messenger {
    use super::{track_message, VALIDATION_STATS};
    use ash::vk;
    use prism_render::prism::{Error, Result};
    use prism_render::{engine_debug, engine_error, engine_info, engine_warn};
    use std::borrow::Cow;
    use std::ffi::CStr;
    use std::sync::atomic::Ordering;

    pub(crate) const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

    unsafe extern "system" fn vulkan_debug_callback(
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT,
        p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
        _user_data: *mut std::os::raw::c_void,
    ) -> vk::Bool32 {
        if p_callback_data.is_null() {
            return vk::FALSE;
        }
        let callback_data = *p_callback_data;
        let message_id = if callback_data.p_message_id_name.is_null() {
            Cow::from("")
        } else {
            CStr::from_ptr(callback_data.p_message_id_name).to_string_lossy()
        };
        let message = if callback_data.p_message.is_null() {
            Cow::from("")
        } else {
            CStr::from_ptr(callback_data.p_message).to_string_lossy()
        };

        let type_str = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
            "Validation"
        } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
            "Performance"
        } else {
            "General"
        };

        let occurrences = track_message(&message_id);
        let repeat = if occurrences > 1 { format!(" [×{}]", occurrences) } else { String::new() };

        if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            VALIDATION_STATS.errors.fetch_add(1, Ordering::Relaxed);
            engine_error!("prism::vulkan::validation", "[{}]{} {}: {}", type_str, repeat, message_id, message);
        } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            VALIDATION_STATS.warnings.fetch_add(1, Ordering::Relaxed);
            engine_warn!("prism::vulkan::validation", "[{}]{} {}: {}", type_str, repeat, message_id, message);
        } else if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            VALIDATION_STATS.info.fetch_add(1, Ordering::Relaxed);
            engine_info!("prism::vulkan::validation", "[{}]{} {}: {}", type_str, repeat, message_id, message);
        } else {
            VALIDATION_STATS.verbose.fetch_add(1, Ordering::Relaxed);
            engine_debug!("prism::vulkan::validation", "[{}]{} {}: {}", type_str, repeat, message_id, message);
        }

        vk::FALSE
    }

    /// Create the debug messenger forwarding validation messages to the logger
    pub(crate) fn create_debug_messenger(
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(vulkan_debug_callback));

        let messenger = unsafe {
            loader.create_debug_utils_messenger(&create_info, None)
                .map_err(|e| {
                    engine_error!("prism::vulkan", "Failed to create debug messenger: {:?}", e);
                    Error::InitializationFailed(format!("Failed to create debug messenger: {:?}", e))
                })?
        };
        Ok((loader, messenger))
    }
}

#[cfg(test)]
#[path = "vulkan_debug_tests.rs"]
mod tests;
