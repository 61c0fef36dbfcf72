pub fn render_password_reset(reset_url: &str) -> (String, String) {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>Password Reset</h2>
    <p>A password reset was requested for your MedBoard account.</p>
    <p><a href="{reset_url}" style="display: inline-block; padding: 10px 20px; background: #0070f3; color: white; text-decoration: none; border-radius: 4px;">Reset Password</a></p>
    <p style="color: #666; font-size: 14px;">This link expires in 30 minutes. If you didn't request this, you can ignore it.</p>
</body>
</html>"#
    );
    let text = format!(
        "A password reset was requested for your MedBoard account.\n\n\
         Reset your password: {reset_url}\n\n\
         This link expires in 30 minutes. If you didn't request this, you can ignore it.\n"
    );
    (html, text)
}

pub fn render_welcome(firstname: &str, base_url: &str) -> (String, String) {
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"></head>
<body style="font-family: sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;">
    <h2>Welcome to MedBoard</h2>
    <p>Hi {firstname},</p>
    <p>Your account has been created. You can log in at:</p>
    <p><a href="{base_url}/login" style="display: inline-block; padding: 10px 20px; background: #0070f3; color: white; text-decoration: none; border-radius: 4px;">Log In</a></p>
    <p style="color: #666; font-size: 14px;">If you didn't expect this email, you can ignore it.</p>
</body>
</html>"#
    );
    let text = format!(
        "Hi {firstname},\n\nYour MedBoard account has been created. Log in at {base_url}/login\n"
    );
    (html, text)
}
