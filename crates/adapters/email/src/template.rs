//! 邮件模板系统

use cardgate_errors::{AppError, AppResult};
use std::collections::HashMap;
use tera::Tera;
use tracing::debug;

const CARD_OTP_HTML: &str = "card_otp.html";
const CARD_OTP_TEXT: &str = "card_otp.txt";

const BUILTIN_CARD_OTP_HTML: &str = r#"<!DOCTYPE html>
<html>
  <body style="font-family: sans-serif;">
    <h2>{{ app_name }} card activation</h2>
    <p>Your activation code is:</p>
    <p style="font-size: 28px; letter-spacing: 6px;"><strong>{{ code }}</strong></p>
    <p>The code expires in {{ expires_in_minutes }} minutes and can be used once.</p>
    <p>If you did not request this code, you can ignore this email.</p>
  </body>
</html>
"#;

const BUILTIN_CARD_OTP_TEXT: &str = "{{ app_name }} card activation\n\n\
Your activation code is: {{ code }}\n\n\
The code expires in {{ expires_in_minutes }} minutes and can be used once.\n";

/// 邮件模板管理器
pub struct EmailTemplate {
    tera: Tera,
}

impl EmailTemplate {
    /// 从目录加载模板（`*.html` 与 `*.txt`）
    pub fn new(template_dir: &str) -> AppResult<Self> {
        let pattern = format!("{}/**/*.{{html,txt}}", template_dir);
        let tera = Tera::new(&pattern)
            .map_err(|e| AppError::internal(format!("Failed to load email templates: {}", e)))?;

        debug!(template_dir = %template_dir, "Email templates loaded");

        Ok(Self { tera })
    }

    /// 使用内置模板
    pub fn builtin() -> AppResult<Self> {
        let mut templates = HashMap::new();
        templates.insert(CARD_OTP_HTML.to_string(), BUILTIN_CARD_OTP_HTML.to_string());
        templates.insert(CARD_OTP_TEXT.to_string(), BUILTIN_CARD_OTP_TEXT.to_string());
        Self::from_strings(templates)
    }

    /// 从内存中的模板字符串创建
    pub fn from_strings(templates: HashMap<String, String>) -> AppResult<Self> {
        let mut tera = Tera::default();

        for (name, content) in templates {
            tera.add_raw_template(&name, &content).map_err(|e| {
                AppError::internal(format!("Failed to add template {}: {}", name, e))
            })?;
        }

        Ok(Self { tera })
    }

    /// 渲染模板
    pub fn render(&self, template_name: &str, context: &serde_json::Value) -> AppResult<String> {
        let context = tera::Context::from_serialize(context)
            .map_err(|e| AppError::internal(format!("Failed to create template context: {}", e)))?;

        self.tera.render(template_name, &context).map_err(|e| {
            AppError::internal(format!(
                "Failed to render template {}: {}",
                template_name, e
            ))
        })
    }

    /// 渲染卡片激活验证码邮件，返回 (HTML, 纯文本)
    pub fn render_card_otp(
        &self,
        app_name: &str,
        code: &str,
        expires_in_minutes: i64,
    ) -> AppResult<(String, String)> {
        let mut context = tera::Context::new();
        context.insert("app_name", app_name);
        context.insert("code", code);
        context.insert("expires_in_minutes", &expires_in_minutes);

        let html = self
            .tera
            .render(CARD_OTP_HTML, &context)
            .map_err(|e| AppError::internal(format!("Failed to render HTML template: {}", e)))?;

        let text = self
            .tera
            .render(CARD_OTP_TEXT, &context)
            .map_err(|e| AppError::internal(format!("Failed to render text template: {}", e)))?;

        Ok((html, text))
    }
}
